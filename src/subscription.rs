//! DOM event listeners with an owner. Dropping a subscription removes its
//! listener, so tearing down whatever holds them unhooks the page.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, EventTarget};

pub struct EventSubscription {
    target: EventTarget,
    event_type: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl EventSubscription {
    /// Attach `handler` to `target`; the event is cast to `E` (e.g. `KeyboardEvent`)
    pub fn listen<E, F>(target: &EventTarget, event_type: &'static str, mut handler: F) -> Result<Self, JsValue>
    where
        E: JsCast,
        F: FnMut(E) + 'static,
    {
        let closure = Closure::wrap(Box::new(move |event: Event| {
            handler(event.unchecked_into::<E>());
        }) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref())?;
        tracing::trace!(event_type, "listener added");

        Ok(Self {
            target: target.clone(),
            event_type,
            closure,
        })
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.event_type, self.closure.as_ref().unchecked_ref())
        {
            tracing::warn!(event_type = self.event_type, error = ?e, "failed to remove listener");
        }
    }
}

/// Every listener the app installed
#[derive(Default)]
pub struct Subscriptions {
    subscriptions: Vec<EventSubscription>,
}

impl Subscriptions {
    pub fn listen<E, F>(&mut self, target: &EventTarget, event_type: &'static str, handler: F) -> Result<(), JsValue>
    where
        E: JsCast,
        F: FnMut(E) + 'static,
    {
        self.subscriptions.push(EventSubscription::listen(target, event_type, handler)?);
        Ok(())
    }

    /// Remove every listener
    pub fn clear(&mut self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        tracing::debug!(count, "listeners removed");
    }
}
