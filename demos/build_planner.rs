//! Build planner example: equipping and swapping items
//!
//! This example demonstrates:
//! - Batched updates with deferred notifications
//! - Local item paths next to global modifiers
//! - Stats reading other stats
//! - Pruning of stats nobody looks at anymore
//! - Breakdowns for tooltips

use statgraph::node::Observable;
use statgraph::stat::{DataType, Entity, ExplicitRegistrationType, StatDefinition, StatFactory};
use statgraph::*;
use std::cell::Cell;
use std::rc::Rc;

fn main() -> Result<(), StatError> {
    // RUST_LOG=statgraph=debug shows batch and prune summaries.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("=== Build Planner Demo ===\n");

    let mut factory = StatFactory::new();
    let strength = factory.stat("Strength", Entity::Character);
    let life = factory.intern(StatDefinition::new("Life", Entity::Character).data_type(DataType::Int))?;
    let damage = factory.stat("PhysicalDamage", Entity::Character);
    let level = factory.intern(
        StatDefinition::new("Level", Entity::Enemy)
            .explicitly_registered(ExplicitRegistrationType::UserSpecifiedValue),
    )?;

    let mut calculator = Calculator::new();
    let repository = calculator.node_repository();

    // ===== Character =====
    println!("1. Character\n");

    let life_total = repository.get_node(Some(&life), NodeType::Total);
    let life_updates = Rc::new(Cell::new(0));
    let counter = Rc::clone(&life_updates);
    life_total.subscribe(Rc::new(move || counter.set(counter.get() + 1)));
    // Nodes learn their inputs when first calculated.
    life_total.value();

    let character = vec![
        Modifier::new([strength.clone()], Form::BaseSet, Value::from(32.0), ModifierSource::Global)?,
        Modifier::new([life.clone()], Form::BaseSet, Value::from(38.0), ModifierSource::Global)?,
        // Every point of Strength grants half a point of Life.
        Modifier::new(
            [life.clone()],
            Form::BaseAdd,
            Value::product([Value::stat(strength.clone()), Value::from(0.5)]),
            ModifierSource::Global,
        )?,
        Modifier::new([life.clone()], Form::Increase, Value::from(25.0), ModifierSource::Global)?,
        Modifier::new([level.clone()], Form::BaseSet, Value::from(68.0), ModifierSource::Global)?,
    ];
    calculator.update(CalculatorUpdate::adding(character));

    println!("  Life: {}", display(life_total.value()));
    println!("  Notifications so far: {}", life_updates.get());
    println!(
        "  Registered stats: {:?}\n",
        calculator
            .explicitly_registered_stats()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    );

    // ===== Equipment =====
    println!("2. Equipment\n");

    let damage_total = repository.get_node(Some(&damage), NodeType::Total);
    damage_total.subscribe(Rc::new(|| {}));
    damage_total.value();

    let axe = ModifierSource::local("Axe");
    let sword = ModifierSource::local("Sword");
    let axe_mods = vec![
        Modifier::new([damage.clone()], Form::BaseAdd, Value::from(40.0), axe.clone())?,
        Modifier::new([damage.clone()], Form::Increase, Value::from(60.0), axe.clone())?,
        Modifier::new([strength.clone()], Form::BaseAdd, Value::from(10.0), axe)?,
    ];
    let sword_mods = vec![
        Modifier::new([damage.clone()], Form::BaseAdd, Value::from(30.0), sword.clone())?,
        Modifier::new([damage.clone()], Form::More, Value::from(50.0), sword)?,
    ];
    let global_damage = Modifier::new([damage.clone()], Form::Increase, Value::from(40.0), ModifierSource::Global)?;

    let equip_axe = CalculatorUpdate::adding(axe_mods.iter().cloned().chain([global_damage]));
    calculator.update(equip_axe);
    println!("  With axe:   damage {}, life {}", display(damage_total.value()), display(life_total.value()));

    // Swap in one batch: subscribers see a single change.
    let before = life_updates.get();
    let swap = CalculatorUpdate {
        added: sword_mods,
        removed: axe_mods,
    };
    calculator.update(swap.clone());
    println!("  With sword: damage {}, life {}", display(damage_total.value()), display(life_total.value()));
    println!("  Life notifications for the swap: {}", life_updates.get() - before);

    let report = calculator.update(swap.inverse());
    println!("  Back to axe: damage {}", display(damage_total.value()));
    println!("  Pruned: {:?}\n", report);

    // ===== Tooltip =====
    println!("3. Tooltip\n");

    let breakdown = calculator.breakdown(&damage);
    print!("{}", breakdown);
    println!("\n{}", breakdown.to_json()?);

    // ===== Live stats =====
    println!("\n4. Live stats\n");

    for stat in calculator.live_stats() {
        println!("  {}", stat);
    }

    Ok(())
}

fn display(value: Option<NodeValue>) -> String {
    value.map_or_else(|| "unset".to_string(), |value| value.to_string())
}
