//! TSB<Schema>: a fixed-shape named record of child time-series.
//!
//! Rust already has a named-record type: a struct. `BundleOutput`/
//! `BundleInput` just let a struct of child outputs/inputs answer the
//! aggregate validity/modified queries the engine needs without reflection.
//! [`bundle_schema!`] generates the boilerplate for a concrete schema.

use super::TimeSeries;
use crate::time::Time;

/// Implemented by a concrete struct of child outputs.
pub trait BundleOutput: TimeSeries {
    fn children(&self) -> Vec<&dyn TimeSeries>;
}

/// Implemented by a concrete struct of child inputs.
pub trait BundleInput: TimeSeries {
    fn children(&self) -> Vec<&dyn TimeSeries>;
}

/// Aggregate validity: every child must be valid (§3's "all-or-nothing"
/// bundle rule — a bundle with one unset field isn't a usable record yet).
pub fn all_valid(children: &[&dyn TimeSeries]) -> bool {
    !children.is_empty() && children.iter().all(|c| c.valid())
}

/// Aggregate last-modified time: the most recent child write.
pub fn max_modified(children: &[&dyn TimeSeries]) -> Time {
    children
        .iter()
        .map(|c| c.last_modified_time())
        .max()
        .unwrap_or(Time::MIN_DT)
}

/// Declares a concrete bundle schema: a named-field output struct, a matching
/// input struct, and their `TimeSeries`/`BundleOutput`/`BundleInput` impls.
/// Each field's type is a scalar element type; the generated field is a
/// [`crate::ts::ScalarOutput`]/[`crate::ts::ScalarInput`] of that type.
#[macro_export]
macro_rules! bundle_schema {
    ($out_name:ident, $in_name:ident { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[derive(Default)]
        pub struct $out_name {
            $(pub $field: $crate::ts::scalar::ScalarOutput<$ty>),+
        }

        impl $crate::ts::TimeSeries for $out_name {
            fn valid(&self) -> bool {
                $crate::ts::bundle::all_valid(&self.children())
            }
            fn last_modified_time(&self) -> $crate::time::Time {
                $crate::ts::bundle::max_modified(&self.children())
            }
        }

        impl $crate::ts::bundle::BundleOutput for $out_name {
            fn children(&self) -> Vec<&dyn $crate::ts::TimeSeries> {
                vec![$(&self.$field),+]
            }
        }

        pub struct $in_name {
            $(pub $field: $crate::ts::scalar::ScalarInput<$ty>),+
        }

        impl $in_name {
            pub fn new(owner: usize) -> Self {
                Self {
                    $($field: $crate::ts::scalar::ScalarInput::new(owner)),+
                }
            }

            pub fn make_active(&mut self) {
                $(self.$field.make_active();)+
            }
        }

        impl $crate::ts::TimeSeries for $in_name {
            fn valid(&self) -> bool {
                $crate::ts::bundle::all_valid(&self.children())
            }
            fn last_modified_time(&self) -> $crate::time::Time {
                $crate::ts::bundle::max_modified(&self.children())
            }
        }

        impl $crate::ts::bundle::BundleInput for $in_name {
            fn children(&self) -> Vec<&dyn $crate::ts::TimeSeries> {
                vec![$(&self.$field),+]
            }
        }
    };
}
