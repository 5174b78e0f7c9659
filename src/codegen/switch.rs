//! Lowering of `tableswitch` and `lookupswitch`.

use crate::codegen::emit::JsWriter;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchLowering {
    /// Target pcs indexed by `key - low`; holes hold the default.
    Indexed { low: i32, high: i32, targets: Vec<u32> },
    /// Compared key by key in ascending order.
    Chain(Vec<(i32, u32)>),
}

/// Indexed lowering is used while the key range spans at most twice as
/// many values as there are keys.
pub fn lower(pairs: &[(i32, u32)], default: u32) -> SwitchLowering {
    let mut sorted = pairs.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    sorted.dedup_by_key(|(k, _)| *k);
    let (Some(&(low, _)), Some(&(high, _))) = (sorted.first(), sorted.last()) else {
        return SwitchLowering::Chain(Vec::new());
    };
    let span = high as i64 - low as i64 + 1;
    if span > 2 * sorted.len() as i64 {
        return SwitchLowering::Chain(sorted);
    }
    let mut targets = vec![default; span as usize];
    for (key, target) in sorted {
        targets[(key as i64 - low as i64) as usize] = target;
    }
    SwitchLowering::Indexed { low, high, targets }
}

fn offset(key: &str, low: i32) -> String {
    match low {
        0 => key.to_string(),
        l if l < 0 => format!("{key} + {}", -(l as i64)),
        l => format!("{key} - {l}"),
    }
}

/// Writes the jump for `key`; control leaves through `continue`.
pub fn emit(out: &mut JsWriter, key: &str, lowering: &SwitchLowering, default: u32) {
    match lowering {
        SwitchLowering::Indexed { low, high, targets } => {
            let table: Vec<String> = targets.iter().map(u32::to_string).collect();
            out.open(format!("if ({key} >= {low} && {key} <= {high}) {{"));
            out.line(format!("gt = [{}][{}];", table.join(", "), offset(key, *low)));
            out.label("} else {");
            out.line(format!("gt = {default};"));
            out.close("}");
        }
        SwitchLowering::Chain(pairs) => {
            for (k, target) in pairs {
                out.line(format!("if ({key} === {k}) {{ gt = {target}; continue; }}"));
            }
            out.line(format!("gt = {default};"));
        }
    }
    out.line("continue;");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_keys_use_a_table() {
        let lowering = lower(&[(1, 10), (2, 20), (4, 40)], 99);
        assert_eq!(
            lowering,
            SwitchLowering::Indexed {
                low: 1,
                high: 4,
                targets: vec![10, 20, 99, 40],
            }
        );
    }

    #[test]
    fn sparse_keys_use_comparisons() {
        let lowering = lower(&[(1000, 10), (1, 20), (50, 30)], 99);
        assert_eq!(lowering, SwitchLowering::Chain(vec![(1, 20), (50, 30), (1000, 10)]));
    }

    #[test]
    fn extreme_keys_do_not_overflow() {
        let lowering = lower(&[(i32::MIN, 1), (i32::MAX, 2)], 3);
        assert!(matches!(lowering, SwitchLowering::Chain(_)));
    }

    #[test]
    fn emits_offset_lookup() {
        let mut out = JsWriter::new();
        emit(&mut out, "stI0", &lower(&[(-1, 5), (0, 6)], 7), 7);
        let text = out.into_string();
        assert!(text.contains("gt = [5, 6][stI0 + 1];"), "{text}");
        assert!(text.contains("gt = 7;"));
        assert!(text.ends_with("continue;\n"));
    }
}
