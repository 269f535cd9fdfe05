#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;

#[derive(Debug, Arbitrary)]
pub struct CriteriaInput {
    pub text: String,
}

fuzz_target!(|input: CriteriaInput| {
    criteria_expr::fuzz_helper::check_criteria(&input.text);
});
