//! Rolled-up blocks: an N-valued keyword line yields N invocations, shorter
//! lines repeat their last value

use proptest::prelude::*;
use tsblender::parser::{tokenize, unroll};
use tsblender::ParamValue;

fn first(value: Option<&ParamValue>) -> String {
    value.and_then(ParamValue::first).unwrap_or_default().to_string()
}

proptest! {
    #[test]
    fn unrolled_count_matches_widest_line(
        names in prop::collection::vec("[a-z][a-z0-9_]{0,10}", 1..8),
        cols in prop::collection::vec(1u32..20, 1..8),
    ) {
        let src = format!(
            "START GET_SERIES_CSV\n CONTEXT all\n FILE data.csv\n NEW_SERIES_NAME {}\n USECOL {}\nEND GET_SERIES_CSV\n",
            names.join(" "),
            cols.iter().map(u32::to_string).collect::<Vec<_>>().join(" "),
        );
        let blocks = tokenize(&src).unwrap();
        let out = unroll(&blocks[0]).unwrap();
        let width = names.len().max(cols.len());

        prop_assert_eq!(out.invocations.len(), width);
        for (i, inv) in out.invocations.iter().enumerate() {
            prop_assert_eq!(inv.start_line, 1);
            prop_assert_eq!(first(inv.get("file")), "data.csv");
            prop_assert_eq!(first(inv.get("context")), "all");
            let name = &names[i.min(names.len() - 1)];
            prop_assert_eq!(&first(inv.get("new_series_name")), name);
            let col = cols[i.min(cols.len() - 1)].to_string();
            prop_assert_eq!(first(inv.get("usecol")), col);
        }
    }

    #[test]
    fn duplicate_tolerant_blocks_never_unroll(
        names in prop::collection::vec("[a-z][a-z0-9]{0,8}", 1..6),
    ) {
        let lines: String = names.iter().map(|n| format!(" SERIES_NAME {n}\n")).collect();
        let src = format!(
            "START LIST_OUTPUT\n CONTEXT all\n FILE out.txt\n SERIES_FORMAT long\n{lines}END LIST_OUTPUT\n"
        );
        let blocks = tokenize(&src).unwrap();
        let out = unroll(&blocks[0]).unwrap();

        prop_assert_eq!(out.invocations.len(), 1);
        let listed = out.invocations[0].get("series_name").map(ParamValue::entries).unwrap_or_default();
        prop_assert_eq!(listed, names.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
