//! Macros for declaring state ids.

/// Declare a group of [`StateId`](crate::core::StateId) constants.
///
/// Each entry becomes an associated constant named after the state, and
/// `ALL` lists them in declaration order.
///
/// # Example
///
/// ```
/// use devfsm::core::StateId;
/// use devfsm::state_ids;
///
/// state_ids! {
///     pub struct Axis {
///         Loaded = 20,
///         Homing = 21,
///         Ready = 22,
///     }
/// }
///
/// assert_eq!(Axis::Homing, StateId::new("Homing", 21));
/// assert_eq!(Axis::ALL.len(), 3);
/// ```
#[macro_export]
macro_rules! state_ids {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$state_meta:meta])*
                $state:ident = $id:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        $vis struct $name;

        #[allow(non_upper_case_globals, dead_code)]
        impl $name {
            $(
                $(#[$state_meta])*
                pub const $state: $crate::core::StateId =
                    $crate::core::StateId::new(stringify!($state), $id);
            )*

            pub const ALL: &'static [$crate::core::StateId] = &[$(Self::$state),*];
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::StateId;

    state_ids! {
        struct Stage {
            Loaded = 20,
            Moving = 21,
            /// Ready for commands
            Ready = 22,
        }
    }

    #[test]
    fn state_ids_macro_generates_constants() {
        assert_eq!(Stage::Loaded, StateId::new("Loaded", 20));
        assert_eq!(Stage::Moving.name(), "Moving");
        assert_eq!(Stage::Ready.id(), 22);
    }

    #[test]
    fn state_ids_lists_all_in_order() {
        let names: Vec<_> = Stage::ALL.iter().map(StateId::name).collect();
        assert_eq!(names, vec!["Loaded", "Moving", "Ready"]);
    }

    #[test]
    fn state_ids_supports_visibility() {
        state_ids! {
            pub struct Public {
                Only = StateId::FIRST_USER_ID,
            }
        }

        assert_eq!(Public::Only.id(), StateId::FIRST_USER_ID);
        assert!(!Public::Only.is_terminal());
    }
}
