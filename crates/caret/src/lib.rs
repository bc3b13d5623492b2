//! Macros for declaring non-exhaustive C-style enumerations, with named members.
//!
//! A "caret" enum wraps an integer or string representation, but is not
//! `#[non_exhaustive]` in the Rust sense — rather, it has an explicit
//! "unrecognized" variant so that values produced by a newer or differently
//! configured peer never fail to parse. This is useful for any wire-visible
//! enumeration whose producer and consumer might disagree about which values
//! are currently known, such as the closed-but-growing reason-code sets used
//! across a signed/versioned protocol.

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Declare a C-style enum over `&'static str` representations, with a
/// fallback variant for unrecognized values.
///
/// ```
/// caret::caret_enum! {
///     #[derive(Clone, Debug, PartialEq, Eq, Hash)]
///     pub enum Color as str {
///         Red => "red",
///         Green => "green",
///         Blue => "blue",
///     }
/// }
/// assert_eq!(Color::from_str("red"), Color::Red);
/// assert_eq!(Color::Red.as_str(), "red");
/// assert_eq!(Color::from_str("purple"), Color::Unrecognized("purple".to_string()));
/// ```
#[macro_export]
macro_rules! caret_enum {
    {
        $(#[$meta:meta])*
        $v:vis enum $name:ident as str {
            $( $(#[$var_meta:meta])* $var:ident => $val:expr ),+ $(,)?
        }
    } => {
        $(#[$meta])*
        $v enum $name {
            $( $(#[$var_meta])* $var, )+
            /// A value that this build does not recognize.
            ///
            /// Preserving the original text (instead of refusing to parse)
            /// lets an older binary talk to a newer peer without breaking on
            /// values it doesn't know about yet.
            Unrecognized(String),
        }

        impl $name {
            /// Return the wire representation of this value.
            pub fn as_str(&self) -> &str {
                match self {
                    $( $name::$var => $val, )+
                    $name::Unrecognized(s) => s.as_str(),
                }
            }

            /// Parse a wire representation into this enum, never failing.
            pub fn from_str(s: &str) -> Self {
                match s {
                    $( $val => $name::$var, )+
                    other => $name::Unrecognized(other.to_string()),
                }
            }

            /// Return true if this is a recognized (non-`Unrecognized`) value.
            pub fn is_recognized(&self) -> bool {
                !matches!(self, $name::Unrecognized(_))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok($name::from_str(&s))
            }
        }
    };
}

#[cfg(test)]
mod test {
    caret_enum! {
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Fruit as str {
            Apple => "apple",
            Banana => "banana",
        }
    }

    #[test]
    fn round_trip_known() {
        assert_eq!(Fruit::from_str("apple"), Fruit::Apple);
        assert_eq!(Fruit::Apple.as_str(), "apple");
        assert!(Fruit::Apple.is_recognized());
    }

    #[test]
    fn unrecognized_preserved() {
        let f = Fruit::from_str("kiwi");
        assert_eq!(f, Fruit::Unrecognized("kiwi".to_string()));
        assert_eq!(f.as_str(), "kiwi");
        assert!(!f.is_recognized());
    }
}
