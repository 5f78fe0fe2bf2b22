use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use rabi_shared::{CropClass, Month};
use wasm_bindgen::JsCast;

use crate::notice::Notice;
use crate::primary::CropPanelText;

const NOTICE_DISMISS_MS: u32 = 5_000;

const PANEL_STYLE: &str = "background: rgba(255,255,255,0.95); border-radius: 6px; box-shadow: 0 1px 5px rgba(0,0,0,0.35); font-family: system-ui, sans-serif; font-size: 0.85rem; color: #222;";

/// Crop class swatches, bottom-right of the primary map.
#[component]
pub fn Legend() -> impl IntoView {
    view! {
        <div
            class="legend"
            style=format!("{PANEL_STYLE} position: absolute; right: 10px; bottom: 24px; padding: 8px 10px; line-height: 1.6; pointer-events: auto;")
        >
            <b>"Crop Classes"</b>
            {CropClass::ALL
                .into_iter()
                .map(|crop| {
                    view! {
                        <div>
                            <span
                                class="lg"
                                style="display: inline-block; width: 14px; height: 14px; margin-right: 6px; vertical-align: middle; border-radius: 2px;"
                                style:background=crop.color()
                            ></span>
                            {crop.label()}
                        </div>
                    }
                })
                .collect_view()}
        </div>
    }
}

pub fn label_toggle_text(visible: bool) -> &'static str {
    if visible { "🏷 Labels ON" } else { "🏷 Labels OFF" }
}

#[component]
pub fn LabelToggle(
    #[prop(into)] visible: Signal<bool>,
    #[prop(into)] on_toggle: Callback<()>,
) -> impl IntoView {
    view! {
        <button
            class="label-toggle"
            style=format!("{PANEL_STYLE} position: absolute; right: 10px; top: 10px; padding: 6px 10px; border: none; cursor: pointer; pointer-events: auto;")
            on:click=move |_| on_toggle.run(())
        >
            {move || label_toggle_text(visible.get())}
        </button>
    }
}

/// Parcel-number search. Enter or the button submits the raw input.
#[component]
pub fn SearchBox(#[prop(into)] on_search: Callback<String>) -> impl IntoView {
    let query = RwSignal::new(String::new());

    let on_input = move |e: leptos::ev::Event| {
        let Some(target) = e.target() else {
            return;
        };
        let Ok(input) = target.dyn_into::<web_sys::HtmlInputElement>() else {
            return;
        };
        query.set(input.value());
    };
    let submit = move || on_search.run(query.get_untracked());

    view! {
        <div class="search-box" style="display: flex; gap: 6px; margin-bottom: 14px;">
            <input
                id="khasraSearchInput"
                type="text"
                placeholder="खसरा नंबर"
                style="flex: 1; padding: 7px 10px; border: 1px solid #bbb; border-radius: 4px; font-size: 0.9rem;"
                prop:value=move || query.get()
                on:input=on_input
                on:keydown=move |e: web_sys::KeyboardEvent| {
                    if e.key() == "Enter" {
                        submit();
                    }
                }
            />
            <button
                id="khasraSearchBtn"
                style="padding: 7px 12px; border: none; border-radius: 4px; background: #2e7d32; color: #fff; cursor: pointer;"
                on:click=move |_| submit()
            >
                "खोजें"
            </button>
        </div>
    }
}

#[component]
fn PanelRow(caption: &'static str, #[prop(into)] value: Signal<String>) -> impl IntoView {
    view! {
        <div style="display: flex; justify-content: space-between; gap: 8px; padding: 6px 0; border-bottom: 1px solid #eee;">
            <span style="color: #555;">{caption}</span>
            <b>{move || value.get()}</b>
        </div>
    }
}

/// Read-only fields of the last prediction shown.
#[component]
pub fn CropPanel(#[prop(into)] panel: Signal<CropPanelText>) -> impl IntoView {
    let predicted = Signal::derive(move || panel.with(|p| p.predicted_crop.clone()));
    let actual = Signal::derive(move || panel.with(|p| p.actual_crop.clone()));
    let name = Signal::derive(move || panel.with(|p| p.crop_name.clone()));

    view! {
        <div class="crop-panel" style="margin-bottom: 14px;">
            <PanelRow caption="अनुमानित रबी फसल" value=predicted />
            <PanelRow caption="वास्तविक रबी फसल" value=actual />
            <PanelRow caption="फसल का नाम" value=name />
        </div>
    }
}

#[component]
pub fn MonthSelect(
    #[prop(into)] month: Signal<Month>,
    #[prop(into)] on_change: Callback<Month>,
) -> impl IntoView {
    let on_select = move |e: leptos::ev::Event| {
        let Some(target) = e.target() else {
            return;
        };
        let Ok(select) = target.dyn_into::<web_sys::HtmlSelectElement>() else {
            return;
        };
        if let Some(month) = Month::parse(&select.value()) {
            on_change.run(month);
        }
    };

    view! {
        <select
            id="monthSelect"
            style="padding: 5px 8px; border: 1px solid #bbb; border-radius: 4px; font-size: 0.9rem;"
            prop:value=move || month.get().as_str()
            on:change=on_select
        >
            {Month::ALL
                .into_iter()
                .map(|m| view! { <option value=m.as_str()>{m.as_str()}</option> })
                .collect_view()}
        </select>
    }
}

/// Transient message banner. Each notice closes itself after a few seconds
/// unless a newer one has replaced it.
#[component]
pub fn NoticeBanner(
    #[prop(into)] notice: Signal<Option<(u64, Notice)>>,
    #[prop(into)] on_dismiss: Callback<u64>,
) -> impl IntoView {
    Effect::new(move || {
        if let Some((serial, _)) = notice.get() {
            wasm_bindgen_futures::spawn_local(async move {
                TimeoutFuture::new(NOTICE_DISMISS_MS).await;
                on_dismiss.run(serial);
            });
        }
    });

    move || {
        notice.get().map(|(serial, n)| {
            view! {
                <div
                    class="notice"
                    role="alert"
                    style="position: fixed; top: 14px; left: 50%; transform: translateX(-50%); z-index: 2000; padding: 10px 16px; background: #fff3cd; color: #664d03; border: 1px solid #ffe69c; border-radius: 6px; box-shadow: 0 2px 8px rgba(0,0,0,0.2); font-family: system-ui, sans-serif;"
                >
                    {n.text()}
                    <button
                        style="margin-left: 12px; border: none; background: none; cursor: pointer; font-size: 1rem;"
                        on:click=move |_| on_dismiss.run(serial)
                    >
                        "×"
                    </button>
                </div>
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_text_tracks_visibility() {
        assert_eq!(label_toggle_text(false), "🏷 Labels OFF");
        assert_eq!(label_toggle_text(true), "🏷 Labels ON");
    }
}
