//! Fingerprint Engine (spec §4.5): a 128-bit content hash over a task's
//! class identity, its persistence-relevant parameters, and its ordered
//! input fingerprints. Two task instances with equal fingerprints are
//! interchangeable — the Execution Engine and [`crate::multichain`] both
//! rely on that equality to dedupe and cache work.

use crate::config::ConfigValue;
use crate::core::Hash128;
use crate::task::{ParamSpec, ParameterSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(Hash128);

impl Fingerprint {
    /// Computes a task instance's fingerprint.
    ///
    /// `param_specs` and `bound` are expected to describe the same task
    /// (the specs the class declared, the values the Parameter Binder
    /// resolved); `param_specs` supplies the declaration order and the
    /// `ignore_persistence`/`dont_persist_default_value` flags that
    /// `ParameterSet` alone doesn't carry.
    pub fn compute(class_full_name: &str, param_specs: &[ParamSpec], bound: &ParameterSet, input_fingerprints: &[Fingerprint]) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(class_full_name.as_bytes());

        for spec in param_specs {
            if spec.ignore_persistence {
                continue;
            }

            let Some(value) = bound.get(spec.name) else {
                continue;
            };

            if spec.dont_persist_default_value && spec.default.as_ref() == Some(value) {
                continue;
            }

            hasher.update(spec.name.as_bytes());
            hasher.update(canonical_repr_of(value).as_bytes());
        }

        hasher.update(b"|inputs|");
        for fp in input_fingerprints {
            hasher.update(&fp.0.to_hex().into_bytes());
        }

        Fingerprint(Hash128::from_hasher(hasher))
    }

    pub fn to_hex(self) -> String {
        self.0.to_hex()
    }

    pub fn inner(self) -> Hash128 {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn canonical_repr_of(value: &ConfigValue) -> String {
    value.canonical_repr()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ConfigValue)]) -> ParameterSet {
        let mut set = ParameterSet::new();
        for (k, v) in pairs {
            set.insert(*k, v.clone());
        }
        set
    }

    #[test]
    fn same_inputs_produce_the_same_fingerprint() {
        let specs = vec![ParamSpec::required("lr")];
        let a = params(&[("lr", ConfigValue::Float(0.1))]);
        let b = params(&[("lr", ConfigValue::Float(0.1))]);

        let fp_a = Fingerprint::compute("training.Train", &specs, &a, &[]);
        let fp_b = Fingerprint::compute("training.Train", &specs, &b, &[]);
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn different_parameter_values_produce_different_fingerprints() {
        let specs = vec![ParamSpec::required("lr")];
        let a = params(&[("lr", ConfigValue::Float(0.1))]);
        let b = params(&[("lr", ConfigValue::Float(0.2))]);

        let fp_a = Fingerprint::compute("training.Train", &specs, &a, &[]);
        let fp_b = Fingerprint::compute("training.Train", &specs, &b, &[]);
        assert_ne!(fp_a, fp_b);
    }

    #[test]
    fn ignore_persistence_parameters_do_not_affect_the_fingerprint() {
        let specs = vec![ParamSpec::required("lr"), ParamSpec::required("num_workers").ignore_persistence()];
        let a = params(&[("lr", ConfigValue::Float(0.1)), ("num_workers", ConfigValue::Int(4))]);
        let b = params(&[("lr", ConfigValue::Float(0.1)), ("num_workers", ConfigValue::Int(16))]);

        let fp_a = Fingerprint::compute("training.Train", &specs, &a, &[]);
        let fp_b = Fingerprint::compute("training.Train", &specs, &b, &[]);
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn dont_persist_default_value_collapses_explicit_default_and_absence() {
        let specs = vec![ParamSpec::with_default("epochs", ConfigValue::Int(10)).dont_persist_default_value()];
        let explicit_default = params(&[("epochs", ConfigValue::Int(10))]);
        let mut no_value = ParameterSet::new();
        no_value.insert("epochs", ConfigValue::Int(10));

        let fp_a = Fingerprint::compute("training.Train", &specs, &explicit_default, &[]);
        let fp_b = Fingerprint::compute("training.Train", &specs, &no_value, &[]);
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn input_fingerprint_order_affects_the_result() {
        let specs: Vec<ParamSpec> = Vec::new();
        let empty = ParameterSet::new();
        let a = Fingerprint::compute("x", &[], &empty, &[]);
        let b = Fingerprint::compute("y", &[], &empty, &[]);

        let fp_ab = Fingerprint::compute("training.Train", &specs, &empty, &[a, b]);
        let fp_ba = Fingerprint::compute("training.Train", &specs, &empty, &[b, a]);
        assert_ne!(fp_ab, fp_ba);
    }
}
