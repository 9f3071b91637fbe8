//! Selector algebra and the transform pass that lowers a processed
//! stylesheet to namespaced CSS.

pub mod custom_selectors;
pub mod dead_rules;
pub mod mixin;
pub mod scope;
pub mod transformer;
pub mod values;

pub use custom_selectors::{expand_custom_selectors, Expansion};
pub use dead_rules::remove_unused_rules;
pub use mixin::{create_class_subset_root, merge_rules, merge_rules_at, MixinError};
pub use scope::{scope_selector, scope_selector_ast, ScopedSelector};
pub use transformer::{Exports, TransformOptions, TransformOutput, Transformer};
pub use values::replace_value_functions;
