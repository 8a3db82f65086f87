use bitflags::bitflags;

use crate::event::DomEvent;

bitflags! {
    /// Modifiers accepted by the flow directive (`v-flow:click.stop.prevent`).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Stop the event from reaching ancestors.
        const STOP = 1;
        /// Prevent the host's default action.
        const PREVENT = 1 << 1;
        /// Listen to the host event even on a component node.
        const NATIVE = 1 << 2;
        /// Write the target's value instead of the event.
        const EXTRACT = 1 << 3;
    }
}

// Alphabetical, which is the order binding keys list them in.
const NAMES: [(&str, Modifiers); 4] = [
    ("extract", Modifiers::EXTRACT),
    ("native", Modifiers::NATIVE),
    ("prevent", Modifiers::PREVENT),
    ("stop", Modifiers::STOP),
];

impl Modifiers {
    /// Look up a modifier by the lowercase name used in templates (`"stop"`).
    pub fn from_modifier_name(name: &str) -> Option<Self> {
        NAMES.iter().find(|(n, _)| *n == name).map(|(_, m)| *m)
    }

    /// Parse modifier names. Unsupported names are skipped.
    pub fn parse<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(Modifiers::empty(), |acc, name| match Self::from_modifier_name(name.as_ref()) {
                Some(m) => acc | m,
                None => {
                    log::debug!("unsupported flow modifier `{}` ignored", name.as_ref());
                    acc
                }
            })
    }

    /// Set modifier names in sorted order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        NAMES
            .into_iter()
            .filter(move |(_, m)| self.contains(*m))
            .map(|(n, _)| n)
    }

    /// Apply the event-altering modifiers.
    pub fn apply(self, event: &DomEvent) {
        if self.contains(Modifiers::STOP) {
            event.stop_propagation();
        }
        if self.contains(Modifiers::PREVENT) {
            event.prevent_default();
        }
    }
}

/// Modifiers resolved against the node they are used on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowModifiers {
    pub modifiers: Modifiers,
    /// Listen to the host event directly: `native` was given, or the node is
    /// not a component.
    pub is_native: bool,
    pub use_extract: bool,
}

impl FlowModifiers {
    pub fn new(modifiers: Modifiers, is_component: bool) -> Self {
        let is_native = modifiers.contains(Modifiers::NATIVE) || !is_component;
        Self {
            modifiers,
            is_native,
            use_extract: is_native && modifiers.contains(Modifiers::EXTRACT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_unknown_names() {
        let m = Modifiers::parse(["stop", "once", "prevent"]);
        assert_eq!(m, Modifiers::STOP | Modifiers::PREVENT);
    }

    #[test]
    fn template_names_resolve() {
        assert_eq!(Modifiers::from_modifier_name("native"), Some(Modifiers::NATIVE));
        assert_eq!(Modifiers::from_modifier_name("STOP"), None);
        // bitflags' own table still resolves the constant names
        assert_eq!(Modifiers::from_name("STOP"), Some(Modifiers::STOP));
    }

    #[test]
    fn names_are_sorted() {
        let m = Modifiers::STOP | Modifiers::EXTRACT | Modifiers::PREVENT;
        assert_eq!(m.names().collect::<Vec<_>>(), ["extract", "prevent", "stop"]);
    }

    #[test]
    fn extract_needs_native_on_components() {
        let extract = Modifiers::EXTRACT;
        assert!(FlowModifiers::new(extract, false).use_extract);
        assert!(!FlowModifiers::new(extract, true).use_extract);
        assert!(!FlowModifiers::new(extract, true).is_native);

        let native = FlowModifiers::new(extract | Modifiers::NATIVE, true);
        assert!(native.is_native && native.use_extract);
    }
}
