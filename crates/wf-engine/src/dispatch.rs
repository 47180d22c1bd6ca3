//! Bound-action dispatch: given a resolved element (or none, for page-level
//! actions), perform the one driver call a [`PlannedStep`] calls for (spec
//! §4.8 step c). Grounded on `original_source/engine/adaptive_engine.py`'s
//! per-`ActionType` branch in `_execute_step`.

use std::time::Duration;

use wf_core_types::{ActionTag, PlannedStep, RunContext, SiteProfile, WaitPolicy};
use wf_driver::{DriverError, Element, Page, WaitUntil};

use wf_locator_resolver::Resolution;

const FAST_TYPE_DELAY: Duration = Duration::from_millis(10);
const SLOW_TYPE_DELAY: Duration = Duration::from_millis(80);
const DEFAULT_WAIT: Duration = Duration::from_secs(1);
const SCROLL_PIXELS: i64 = 300;

pub fn wait_until_for(profile: &SiteProfile) -> WaitUntil {
    match profile.wait_policy() {
        WaitPolicy::NetworkIdle => WaitUntil::NetworkIdle,
        WaitPolicy::DomContentLoaded => WaitUntil::DomContentLoaded,
        WaitPolicy::Load => WaitUntil::Load,
    }
}

/// Execute `step`'s action. Returns the extracted text for `Extract` steps,
/// `None` for every other action.
pub async fn execute(
    page: &dyn Page,
    step: &PlannedStep,
    resolution: Option<&Resolution>,
    profile: &SiteProfile,
    ctx: &mut RunContext,
) -> Result<Option<String>, DriverError> {
    match step.action {
        ActionTag::Navigate => {
            let url = step.value.as_deref().unwrap_or(&step.target);
            page.goto(url, wait_until_for(profile)).await?;
            Ok(None)
        }
        ActionTag::Click => {
            let element = element_of(resolution)?;
            if ctx.flag("force_click") {
                element.click_forced().await?;
            } else {
                element.click().await?;
            }
            Ok(None)
        }
        ActionTag::Fill => {
            let element = element_of(resolution)?;
            let value = step.value.as_deref().unwrap_or("");
            let value = ctx.resolve_template(value);
            if ctx.flag("slow_type") {
                element.type_text(&value, SLOW_TYPE_DELAY).await?;
            } else {
                element.fill(&value).await?;
            }
            Ok(None)
        }
        ActionTag::Type => {
            let element = element_of(resolution)?;
            let value = step.value.as_deref().unwrap_or("");
            let value = ctx.resolve_template(value);
            let delay = if ctx.flag("slow_type") { SLOW_TYPE_DELAY } else { FAST_TYPE_DELAY };
            element.type_text(&value, delay).await?;
            Ok(None)
        }
        ActionTag::Select => {
            let element = element_of(resolution)?;
            let value = step.value.clone().unwrap_or_default();
            element.select_option(&[value]).await?;
            Ok(None)
        }
        ActionTag::Hover => {
            let element = element_of(resolution)?;
            element.hover().await?;
            Ok(None)
        }
        ActionTag::Scroll => {
            if let Some(resolution) = resolution {
                resolution.element.scroll_into_view().await?;
            } else {
                let direction = if step.target == "up" { -SCROLL_PIXELS } else { SCROLL_PIXELS };
                page.evaluate(&format!("window.scrollBy(0, {direction})")).await?;
            }
            Ok(None)
        }
        ActionTag::Wait => {
            let seconds: f64 = step.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0.0);
            let duration = if seconds > 0.0 { Duration::from_secs_f64(seconds) } else { DEFAULT_WAIT };
            tokio::time::sleep(duration).await;
            Ok(None)
        }
        ActionTag::PressKey => {
            let key = step.value.as_deref().unwrap_or("Enter");
            match resolution {
                Some(resolution) => resolution.element.press_key(key).await?,
                None => page.press_key(key).await?,
            }
            Ok(None)
        }
        ActionTag::Extract => {
            let element = element_of(resolution)?;
            let text = element.text_content().await?;
            Ok(Some(text))
        }
    }
}

fn element_of(resolution: Option<&Resolution>) -> Result<&dyn Element, DriverError> {
    resolution
        .map(|resolution| resolution.element.as_ref())
        .ok_or_else(|| DriverError::Failed("action requires a resolved element but none was bound".to_string()))
}
