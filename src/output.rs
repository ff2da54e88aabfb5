//! Naming of experiment outputs.

pub use benchgen_proc_macro::Parametrize;

/// A type that can produce a human-readable name from (some of) its fields. Use
/// `#[derive(Parametrize)]` and mark the relevant fields with `#[name]` or `#[name(<cond>)]`.
pub trait Parametrize {
    /// The components of the name, in field order.
    fn name_parts(&self) -> Vec<String>;

    /// The composite experiment name, e.g. `p4_t4p4s/mat/number_entries_exact`.
    fn experiment_name(&self) -> String {
        self.name_parts().join("/")
    }
}
