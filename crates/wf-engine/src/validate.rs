//! Post-validation dispatch by action type, and the bridge from a failed
//! [`ValidationResult`] into `wf-error-recovery`'s classifier (spec §4.6,
//! §4.7).
//!
//! `wf-step-validator`'s messages are human-readable diagnostics, not
//! driver error text, so they don't reliably contain the substrings
//! `wf_error_recovery::classify_error` matches on. Each action rewords its
//! validation failure into a message carrying the right substring before
//! handing it to recovery.

use wf_core_types::{ActionTag, PlannedStep};
use wf_driver::Page;
use wf_step_validator::{StepValidator, ValidationResult};

/// Run the action-appropriate post-validation check. Actions with no
/// DOM effect to confirm (`Wait`, `Scroll`, `PressKey`, `Hover`, `Extract`)
/// have nothing to validate and always report success.
pub async fn post_validate(
    validator: &StepValidator,
    page: &dyn Page,
    step: &PlannedStep,
    selector: &str,
    url_before: &str,
    dom_before: &str,
) -> ValidationResult {
    match step.action {
        ActionTag::Navigate => {
            let expected = step.value.as_deref().unwrap_or(&step.target);
            validator.validate_navigate(&page.url(), expected)
        }
        ActionTag::Click => validator.validate_click(page, selector, url_before, dom_before).await,
        ActionTag::Fill | ActionTag::Type => validator.validate_fill(page, selector, step.value.as_deref().unwrap_or_default()).await,
        ActionTag::Select => validator.validate_select(page, selector, step.value.as_deref().unwrap_or_default()).await,
        ActionTag::Hover | ActionTag::Scroll | ActionTag::Wait | ActionTag::PressKey | ActionTag::Extract => always_succeeds(step),
    }
}

fn always_succeeds(step: &PlannedStep) -> ValidationResult {
    ValidationResult {
        success: true,
        action: step.action.name().to_string(),
        target: step.target.clone(),
        expected: None,
        actual: None,
        methods: Vec::new(),
        message: "no post-validation required for this action".to_string(),
        retry_suggested: false,
    }
}

/// Reword a failed [`ValidationResult`] so the recovery classifier's
/// substring patterns match the right [`wf_error_recovery::ErrorKind`] for
/// this action (`Select` has no dedicated kind in the closed taxonomy and
/// falls through to generic recovery).
pub fn synthetic_recovery_message(step: &PlannedStep, validation: &ValidationResult) -> String {
    match step.action {
        ActionTag::Fill | ActionTag::Type => format!("fill failed: {}", validation.message),
        ActionTag::Click => format!("not clickable: {}", validation.message),
        ActionTag::Navigate => format!("navigation failed: {}", validation.message),
        _ => format!("validation failed: {}", validation.message),
    }
}
