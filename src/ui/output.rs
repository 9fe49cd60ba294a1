use std::path::Path;

use crate::datapoint::DataPoint;
use crate::ui::{theme, Icons};
use crate::validate::ValidationError;
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().heading));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().ok));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().failure));
}

pub fn empty(label: &str) {
    println!("{} {}", Icons::EMPTY, label.style(theme().id));
}

/// `#id asset = value @ timestamp`
pub fn point(point: &DataPoint) {
    let t = theme();
    println!(
        "{} {} {} = {} {}",
        Icons::STATS,
        format!("#{}", point.id).style(t.id),
        point.asset.style(t.asset),
        point.value.style(t.value),
        format!("@ {}", point.timestamp.to_rfc3339()).style(t.timestamp),
    );
}

/// Every violation of a rejected record, first one first
pub fn violations(err: &ValidationError) {
    error(err.name());
    for v in err.details() {
        eprintln!("  {} {}", format!("[{}]", v.field).style(theme().field), v.message);
    }
}

pub fn database(path: &Path) {
    println!("{} {}", Icons::DATABASE, path.display().style(theme().id));
}

pub fn column(name: &str) {
    println!("  - {}", name.style(theme().field));
}
