//! Declaration helper for the closed status/category enums used by every record type.

/// Lowercases and strips everything but ASCII letters and digits, so that `"In Progress"`,
/// `"in_progress"` and `"IN-PROGRESS"` compare equal.
pub(crate) fn normalise_label(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Declares a closed enum with a display label per variant.
///
/// The generated type is `Copy`, serialises in snake_case, displays as its label, and parses
/// from either the label or the snake_case form (case and punctuation insensitive).
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Human-readable label as shown in the dashboards.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::LisError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = $crate::macros::normalise_label(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| $crate::macros::normalise_label(v.label()) == wanted)
                    .ok_or_else(|| {
                        $crate::error::LisError::InvalidInput(format!(
                            "unknown {}: '{}'",
                            stringify!($name),
                            s
                        ))
                    })
            }
        }
    };
}
