//! In-page detection script and the JS-result-to-[`SiteProfile`] mapping.
//! Transcribed from `original_source/engine/site_profiler.py`'s
//! `DETECT_SITE_JS` and `_detect`.

use serde_json::Value;
use wf_core_types::{Framework, LocatorStrategy, SiteProfile};

pub const DETECT_SITE_JS: &str = r#"() => {
    const profile = {
        framework: null,
        rootSelector: 'body',
        usesShadowDom: false,
        needsHydrationWait: false,
        selectorPriorities: [],
        detectionConfidence: 0
    };

    const hasReactDevtools = !!window.__REACT_DEVTOOLS_GLOBAL_HOOK__;
    const hasReactRoot = !!document.querySelector('[data-reactroot]');
    const hasReactFiber = !!document.querySelector('[data-reactid]');
    const hasNextData = !!window.__NEXT_DATA__ || !!document.getElementById('__next');

    if (hasNextData) {
        profile.framework = 'next.js';
        profile.rootSelector = '#__next';
        profile.needsHydrationWait = true;
        profile.detectionConfidence = 0.95;
    } else if (hasReactDevtools || hasReactRoot || hasReactFiber) {
        profile.framework = 'react';
        profile.rootSelector = '#root, #app, [data-reactroot]';
        profile.needsHydrationWait = true;
        profile.detectionConfidence = 0.85;
    }

    const hasNg = !!window.ng || !!window.getAllAngularRootElements;
    const hasNgVersion = !!window.angular;
    const hasAppRoot = !!document.querySelector('app-root');
    const hasNgAttrs = !!document.querySelector('[ng-version], [_ngcontent], [_nghost]');

    if (!profile.framework && (hasNg || hasAppRoot || hasNgAttrs)) {
        profile.framework = hasNgVersion ? 'angularjs' : 'angular';
        profile.rootSelector = 'app-root';
        profile.needsHydrationWait = true;
        profile.detectionConfidence = 0.85;
    }

    const hasVue = !!window.__VUE__ || !!window.Vue;
    const hasVueAttrs = !!document.querySelector('[data-v-]');
    const hasNuxt = !!window.__NUXT__ || !!document.getElementById('__nuxt');

    if (!profile.framework && (hasVue || hasVueAttrs || hasNuxt)) {
        profile.framework = hasNuxt ? 'nuxt' : 'vue';
        profile.rootSelector = hasNuxt ? '#__nuxt' : '#app';
        profile.needsHydrationWait = hasNuxt;
        profile.detectionConfidence = 0.85;
    }

    const hasSvelte = !!document.querySelector('[class*="svelte-"]');
    if (!profile.framework && hasSvelte) {
        profile.framework = 'svelte';
        profile.detectionConfidence = 0.7;
    }

    if (!profile.framework) {
        profile.framework = 'vanilla';
        profile.detectionConfidence = 0.5;
    }

    const hasTestIds = !!document.querySelector('[data-testid]');
    const hasRoles = document.querySelectorAll('[role]').length > 3;
    const hasAriaLabels = document.querySelectorAll('[aria-label]').length > 3;
    const hasNames = document.querySelectorAll('[name]').length > 3;
    const hasPlaceholders = document.querySelectorAll('[placeholder]').length > 2;
    const hasIds = document.querySelectorAll('[id]').length > 5;

    const priorities = [];
    if (hasTestIds) priorities.push('testid');
    if (hasRoles) priorities.push('role');
    if (hasAriaLabels) priorities.push('aria');
    if (hasNames) priorities.push('label');
    if (hasPlaceholders) priorities.push('placeholder');
    priorities.push('text');
    if (hasIds) priorities.push('css');

    profile.selectorPriorities = priorities;

    const allElements = document.querySelectorAll('*');
    for (let i = 0; i < Math.min(allElements.length, 100); i++) {
        if (allElements[i].shadowRoot) {
            profile.usesShadowDom = true;
            break;
        }
    }

    return profile;
}"#;

pub fn profile_from_js(domain: &str, value: &Value) -> SiteProfile {
    let framework = value
        .get("framework")
        .and_then(Value::as_str)
        .map(framework_from_label)
        .unwrap_or(Framework::Unknown);

    let root_selector = value
        .get("rootSelector")
        .and_then(Value::as_str)
        .unwrap_or("body")
        .to_string();

    let selector_priorities = value
        .get("selectorPriorities")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(LocatorStrategy::from_name)
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![LocatorStrategy::Text]);

    let mut profile = SiteProfile::new(domain);
    profile.framework = framework;
    profile.root_selector = root_selector;
    profile.selector_priorities = selector_priorities;
    profile.uses_shadow_dom = value.get("usesShadowDom").and_then(Value::as_bool).unwrap_or(false);
    profile.needs_hydration_wait = value.get("needsHydrationWait").and_then(Value::as_bool).unwrap_or(false);
    profile.detection_confidence = value.get("detectionConfidence").and_then(Value::as_f64).unwrap_or(0.5);
    profile.ensure_universal_fallback();
    profile
}

fn framework_from_label(label: &str) -> Framework {
    match label {
        "react" => Framework::React,
        "next.js" => Framework::Next,
        "angular" => Framework::Angular,
        "angularjs" => Framework::AngularJs,
        "vue" => Framework::Vue,
        "nuxt" => Framework::Nuxt,
        "svelte" => Framework::Svelte,
        "vanilla" => Framework::Vanilla,
        _ => Framework::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_next_js_payload() {
        let value = json!({
            "framework": "next.js",
            "rootSelector": "#__next",
            "selectorPriorities": ["testid", "role", "text"],
            "usesShadowDom": false,
            "needsHydrationWait": true,
            "detectionConfidence": 0.95,
        });
        let profile = profile_from_js("shop.example", &value);
        assert_eq!(profile.framework, Framework::Next);
        assert!(profile.needs_hydration_wait);
        assert_eq!(profile.selector_priorities[0], LocatorStrategy::Testid);
    }

    #[test]
    fn missing_priorities_falls_back_to_text_only() {
        let value = json!({"framework": "vanilla"});
        let profile = profile_from_js("plain.example", &value);
        assert_eq!(profile.selector_priorities, vec![LocatorStrategy::Text]);
    }
}
