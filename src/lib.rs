// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

#[cfg(target_arch = "wasm32")]
pub mod subscription;

#[cfg(target_arch = "wasm32")]
use std::{cell::{Cell, RefCell}, rc::Rc};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, Event, HtmlCanvasElement, HtmlElement, KeyboardEvent, MouseEvent, Window};

#[cfg(target_arch = "wasm32")]
use crate::{
    config::PlaygroundConfig,
    controller::{input::wasm as dom, FrameLoopContext, InputEvent, InputProcessor, InputState, LockEvent, Playground},
    error::InitError,
    subscription::Subscriptions,
    view::{GpuContext, RenderState},
};

#[cfg(target_arch = "wasm32")]
thread_local! {
    static RUNNING: RefCell<Option<Running>> = const { RefCell::new(None) };
}

/// The live app: its frame loop and the page listeners feeding it
#[cfg(target_arch = "wasm32")]
struct Running {
    animation: AnimationLoop,
    subscriptions: Subscriptions,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    logging::init();
    let (window, document, canvas) = init_canvas()?;
    setup_app(window, document, canvas).await?;
    Ok(())
}

/// Stop the frame loop and remove every listener the app installed
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn shutdown() {
    let Some(Running { animation, mut subscriptions }) = RUNNING.with(|running| running.borrow_mut().take()) else {
        return;
    };
    subscriptions.clear();
    drop(animation);
    tracing::info!("playground shut down");
}

/// Main application setup for WASM
#[cfg(target_arch = "wasm32")]
async fn setup_app(window: Window, document: Document, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
    use rand::SeedableRng;

    let (width, height) = (canvas.width(), canvas.height());
    let gpu = GpuContext::new(&canvas, width, height).await?;
    let render_state = RenderState::new(&gpu.device, gpu.format, gpu.config.alpha_mode, width, height);

    let mut rng = rand_chacha::ChaCha8Rng::from_entropy();
    let mut playground = Playground::new(PlaygroundConfig::default(), width, height, &mut rng);

    // Show the instructions overlay (if the page has one) only while unlocked
    if let Some(overlay) = document
        .get_element_by_id("instructions")
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    {
        playground.controller.subscribe(move |event| {
            let display = match event {
                LockEvent::Acquired => "none",
                LockEvent::Released => "",
            };
            if let Err(e) = overlay.style().set_property("display", display) {
                tracing::warn!(error = ?e, "failed to toggle instructions");
            }
        });
    }
    playground.controller.subscribe(|event| tracing::debug!(?event, "controller engagement"));

    let input = Rc::new(RefCell::new(InputState::new()));
    let subscriptions =
        setup_input_listeners(&window, &document, &canvas, input.clone(), playground.input_processor.clone())?;
    tracing::info!(width, height, "playground ready");

    let mut frame_ctx = FrameLoopContext {
        playground,
        input,
        gpu,
        render_state,
        egui_ctx: egui::Context::default(),
        window: window.clone(),
        canvas,
        last_time: None,
    };

    let animation = AnimationLoop::start(window, move || frame_ctx.frame())?;
    RUNNING.with(|running| *running.borrow_mut() = Some(Running { animation, subscriptions }));
    Ok(())
}

/// Install DOM listeners that feed `InputState`. The returned subscriptions own them.
#[cfg(target_arch = "wasm32")]
fn setup_input_listeners(
    window: &Window,
    document: &Document,
    canvas: &HtmlCanvasElement,
    input_state: Rc<RefCell<InputState>>,
    input_processor: InputProcessor,
) -> Result<Subscriptions, JsValue> {
    let mut subs = Subscriptions::default();

    // Keyboard down
    {
        let input_state = input_state.clone();
        let document_for_exit = document.clone();
        let input_processor = input_processor.clone();
        subs.listen(document, "keydown", move |e: KeyboardEvent| {
            let key = e.key();
            if input_processor.is_escape(&key) {
                document_for_exit.exit_pointer_lock();
            }
            if input_processor.is_navigation_key(&key) {
                e.prevent_default();
            }
            input_state.borrow_mut().process_event(&dom::keyboard_event_to_input(&e, true));
        })?;
    }

    // Keyboard up
    {
        let input_state = input_state.clone();
        subs.listen(document, "keyup", move |e: KeyboardEvent| {
            input_state.borrow_mut().process_event(&dom::keyboard_event_to_input(&e, false));
        })?;
    }

    // Focus loss - clear all keys
    {
        let input_state = input_state.clone();
        subs.listen(window, "blur", move |_e: Event| {
            input_state.borrow_mut().process_event(&InputEvent::FocusLost);
        })?;
    }
    {
        let input_state = input_state.clone();
        subs.listen(document, "visibilitychange", move |_e: Event| {
            input_state.borrow_mut().process_event(&InputEvent::FocusLost);
        })?;
    }

    // Pointer lock change
    {
        let input_state = input_state.clone();
        let doc_pl = document.clone();
        subs.listen(document, "pointerlockchange", move |_e: Event| {
            let locked = doc_pl.pointer_lock_element().is_some();
            input_state.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
        })?;
    }

    // Canvas click to enter pointer lock
    {
        let canvas_click = canvas.clone();
        subs.listen(canvas, "click", move |_e: MouseEvent| {
            canvas_click.request_pointer_lock();
        })?;
    }

    // Mouse move
    {
        let input_state = input_state.clone();
        subs.listen(document, "mousemove", move |e: MouseEvent| {
            input_state.borrow_mut().process_event(&dom::mouse_move_to_input(&e));
        })?;
    }

    // Mouse buttons - charge on press, fire on release
    {
        let input_state = input_state.clone();
        subs.listen(document, "mousedown", move |e: MouseEvent| {
            input_state.borrow_mut().process_event(&dom::mouse_button_to_input(&e, true));
        })?;
    }
    {
        let input_state = input_state.clone();
        subs.listen(document, "mouseup", move |e: MouseEvent| {
            input_state.borrow_mut().process_event(&dom::mouse_button_to_input(&e, false));
        })?;
    }

    // Context menu prevention
    subs.listen(canvas, "contextmenu", move |e: MouseEvent| {
        e.prevent_default();
    })?;

    Ok(subs)
}

/// Full-window canvas appended to the body, sized in physical pixels
#[cfg(target_arch = "wasm32")]
fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), InitError> {
    let window = web_sys::window().ok_or(InitError::NoWindow)?;
    let document = window.document().ok_or(InitError::NoDocument)?;
    let body = document.body().ok_or(InitError::NoBody)?;
    let canvas = document
        .create_element("canvas")
        .map_err(|e| InitError::Canvas(format!("{e:?}")))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| InitError::Canvas("element is not a canvas".into()))?;

    let dpr = window.device_pixel_ratio();
    let css_width = window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(800.0);
    let css_height = window.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(600.0);
    canvas.set_width((css_width * dpr) as u32);
    canvas.set_height((css_height * dpr) as u32);
    let style = canvas.style();
    style
        .set_property("width", "100vw")
        .and_then(|_| style.set_property("height", "100vh"))
        .and_then(|_| style.set_property("display", "block"))
        .map_err(|e| InitError::Canvas(format!("{e:?}")))?;

    body.append_child(&canvas).map_err(|e| InitError::Canvas(format!("{e:?}")))?;
    Ok((window, document, canvas))
}

/// requestAnimationFrame loop. Dropping it cancels the pending frame and
/// releases the frame closure along with everything it captured.
#[cfg(target_arch = "wasm32")]
struct AnimationLoop {
    window: Window,
    callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
    frame_id: Rc<Cell<Option<i32>>>,
}

#[cfg(target_arch = "wasm32")]
impl AnimationLoop {
    fn start(window: Window, mut f: impl FnMut() + 'static) -> Result<Self, JsValue> {
        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let frame_id = Rc::new(Cell::new(None));

        let callback_clone = callback.clone();
        let frame_id_clone = frame_id.clone();
        let window_for_loop = window.clone();
        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            f();

            // Schedule next frame
            let cb_ref = callback_clone.borrow();
            let Some(cb) = cb_ref.as_ref() else { return };
            match window_for_loop.request_animation_frame(cb.as_ref().unchecked_ref()) {
                Ok(id) => frame_id_clone.set(Some(id)),
                Err(e) => tracing::error!(error = ?e, "requestAnimationFrame failed; frame loop stopped"),
            }
        }) as Box<dyn FnMut()>));

        let id = {
            let cb_ref = callback.borrow();
            let cb = cb_ref.as_ref().ok_or_else(|| JsValue::from_str("frame callback missing"))?;
            window.request_animation_frame(cb.as_ref().unchecked_ref())?
        };
        frame_id.set(Some(id));

        Ok(Self { window, callback, frame_id })
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for AnimationLoop {
    fn drop(&mut self) {
        if let Some(id) = self.frame_id.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        self.callback.borrow_mut().take();
    }
}
