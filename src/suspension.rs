//! Batched change notification.
//!
//! Every live node, modifier collection and path collection can defer its
//! external notifications. The calculator suspends all of them before a
//! batch of modifier changes and resumes them afterwards, so consumers see at
//! most one notification per node and batch.

use std::rc::Rc;

/// The ability to defer external change notifications.
pub trait SuspendableEvents {
    fn suspend_events(&self);

    /// Leave the suspension started by the matching `suspend_events` and
    /// deliver whatever net change is left.
    fn resume_events(&self);
}

/// Suspends and resumes a set of members together.
#[derive(Default)]
pub struct SuspendableEventsComposite {
    members: Vec<Rc<dyn SuspendableEvents>>,
}

impl SuspendableEventsComposite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, member: Rc<dyn SuspendableEvents>) {
        self.members.push(member);
    }

    pub fn extend(&mut self, other: SuspendableEventsComposite) {
        self.members.extend(other.members);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl SuspendableEvents for SuspendableEventsComposite {
    fn suspend_events(&self) {
        for member in &self.members {
            member.suspend_events();
        }
    }

    fn resume_events(&self) {
        for member in &self.members {
            member.resume_events();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Probe {
        depth: Cell<i32>,
    }

    impl SuspendableEvents for Probe {
        fn suspend_events(&self) {
            self.depth.set(self.depth.get() + 1);
        }

        fn resume_events(&self) {
            self.depth.set(self.depth.get() - 1);
        }
    }

    #[test]
    fn test_composite_forwards_to_all_members() {
        let a = Rc::new(Probe::default());
        let b = Rc::new(Probe::default());
        let mut composite = SuspendableEventsComposite::new();
        composite.add(a.clone());
        composite.add(b.clone());

        composite.suspend_events();
        assert_eq!(a.depth.get(), 1);
        assert_eq!(b.depth.get(), 1);

        composite.resume_events();
        assert_eq!(a.depth.get(), 0);
        assert_eq!(b.depth.get(), 0);
        assert_eq!(composite.len(), 2);
    }
}
