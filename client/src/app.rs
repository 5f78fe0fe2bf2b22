use leptos::prelude::*;

use crate::comparison::ComparisonViewer;
use crate::config::{ViewerConfig, ViewerKind};
use crate::primary::PrimaryViewer;

fn remove_loading_shell() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    if let Some(shell) = document.get_element_by_id("app-loading-shell") {
        shell.remove();
    }
}

/// Root component: mounts the viewer the page URL asks for.
#[component]
pub fn App() -> impl IntoView {
    let config = ViewerConfig::load();
    let kind = ViewerKind::current();
    web_sys::console::info_1(&format!("rabi viewer: {kind:?} against {}", config.api_base).into());

    Effect::new(remove_loading_shell);

    match kind {
        ViewerKind::Primary => view! { <PrimaryViewer config=config /> }.into_any(),
        ViewerKind::Comparison => view! { <ComparisonViewer config=config /> }.into_any(),
    }
}
