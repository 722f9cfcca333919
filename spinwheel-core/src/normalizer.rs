use crate::error::{CoreResult, SpinError};
use crate::model::{CompareScenariosRequest, SpinArguments};
use unicode_normalization::UnicodeNormalization;

const MIN_YEAR: i32 = 1000;
const MAX_YEAR: i32 = 2100;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    t.trim().to_string()
}

/// Normalize the free-text parts of a spin and reject arguments the backend would refuse.
pub fn normalize_spin(mut args: SpinArguments) -> CoreResult<SpinArguments> {
    args.city = clean_text(&args.city);
    if args.city.is_empty() {
        return Err(SpinError::Validation("city is required".into()));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&args.year) {
        return Err(SpinError::Validation(format!(
            "year {} outside {MIN_YEAR}..={MAX_YEAR}",
            args.year
        )));
    }
    args.gender.description = clean_text(&args.gender.description);
    if args.gender.description.is_empty() {
        args.gender.description = args.gender.id.description().to_string();
    }
    Ok(args)
}

pub fn normalize_compare(mut req: CompareScenariosRequest) -> CoreResult<CompareScenariosRequest> {
    req.spin_arguments_first_story = normalize_spin(req.spin_arguments_first_story)?;
    req.spin_arguments_second_story = normalize_spin(req.spin_arguments_second_story)?;
    Ok(req)
}
