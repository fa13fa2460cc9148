//! Resource quantities as integer milli-cores and bytes
//!
//! Parsing is delegated to `k8s_metrics::QuantityExt`. CPU is rounded up to
//! whole milli-cores, matching how the API server reports `MilliValue()`.
//! Unparseable quantities count as zero.

use k8s_metrics::QuantityExt;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Cores to milli-cores, rounding sub-milli remainders up.
/// Float noise below a billionth of a milli-core is not a remainder.
fn cores_to_milli(cores: f64) -> i64 {
    if !cores.is_finite() {
        return 0;
    }
    let milli = cores * 1000.0;
    let nearest = milli.round();
    if (milli - nearest).abs() < 1e-9 {
        nearest as i64
    } else {
        milli.ceil() as i64
    }
}

/// CPU quantity in milli-cores
pub fn cpu_milli(quantity: &Quantity) -> i64 {
    quantity.to_f64().map(cores_to_milli).unwrap_or(0)
}

/// Memory quantity in bytes
pub fn memory_bytes(quantity: &Quantity) -> i64 {
    quantity.to_memory().unwrap_or(0)
}

/// CPU milli-cores from a resource list, zero when absent
pub fn cpu_milli_of(resources: Option<&BTreeMap<String, Quantity>>) -> i64 {
    resources
        .and_then(|r| r.get("cpu"))
        .map(cpu_milli)
        .unwrap_or(0)
}

/// Memory bytes from a resource list, zero when absent
pub fn memory_bytes_of(resources: Option<&BTreeMap<String, Quantity>>) -> i64 {
    resources
        .and_then(|r| r.get("memory"))
        .map(memory_bytes)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity(s.to_string())
    }

    #[test]
    fn test_cpu_quantities() {
        assert_eq!(cpu_milli(&q("250m")), 250);
        assert_eq!(cpu_milli(&q("300m")), 300);
        assert_eq!(cpu_milli(&q("2000m")), 2000);
        assert_eq!(cpu_milli(&q("2")), 2000);
        assert_eq!(cpu_milli(&q("1.5")), 1500);
        assert_eq!(cpu_milli(&q("0.1")), 100);
    }

    #[test]
    fn test_sub_milli_cpu_rounds_up() {
        assert_eq!(cpu_milli(&q("12345678n")), 13);
        assert_eq!(cpu_milli(&q("0")), 0);
        assert_eq!(cores_to_milli(0.0123), 13);
        assert_eq!(cores_to_milli(0.3), 300);
    }

    #[test]
    fn test_memory_quantities() {
        assert_eq!(memory_bytes(&q("4Gi")), 4 * 1024 * 1024 * 1024);
        assert_eq!(memory_bytes(&q("800Mi")), 800 * 1024 * 1024);
        assert_eq!(memory_bytes(&q("1024Ki")), 1024 * 1024);
        assert_eq!(memory_bytes(&q("1000")), 1000);
    }

    #[test]
    fn test_non_finite_cores_count_as_zero() {
        assert_eq!(cpu_milli(&q("0e999999999")), 0);
        assert_eq!(cores_to_milli(f64::INFINITY), 0);
        assert_eq!(cores_to_milli(f64::NAN), 0);
        assert_eq!(cores_to_milli(1e300), i64::MAX);
    }

    #[test]
    fn test_invalid_quantities_count_as_zero() {
        assert_eq!(cpu_milli(&q("")), 0);
        assert_eq!(cpu_milli(&q("abc")), 0);
        assert_eq!(memory_bytes(&q("garbage")), 0);
        assert_eq!(memory_bytes(&q("10Xi")), 0);
    }

    #[test]
    fn test_resource_list_lookup() {
        let list = BTreeMap::from([
            ("cpu".to_string(), q("500m")),
            ("memory".to_string(), q("1Gi")),
        ]);
        assert_eq!(cpu_milli_of(Some(&list)), 500);
        assert_eq!(memory_bytes_of(Some(&list)), 1 << 30);
        assert_eq!(cpu_milli_of(None), 0);
    }
}
