//! Label text for the rendering consumer.

use crate::components::{Base, Label, Mine, Unit};
use bevy_ecs::prelude::*;

/// Components that can describe their entity in a short label.
pub trait Describe {
    fn describe(&self) -> String;
}

impl Describe for Unit {
    fn describe(&self) -> String {
        format!("{}\nOre: {:.2}", self.name, self.load)
    }
}

impl Describe for Mine {
    fn describe(&self) -> String {
        format!("{:.2}", self.remaining)
    }
}

impl Describe for Base {
    fn describe(&self) -> String {
        format!("Base Ore: {:.2}", self.stored)
    }
}

/// Refresh the label of every entity carrying `T`.
pub fn label_system<T: Component + Describe>(mut query: Query<(&T, &mut Label)>) {
    for (source, mut label) in query.iter_mut() {
        let text = source.describe();
        if label.0 != text {
            label.0 = text;
        }
    }
}
