/// Failures while bringing up the window, canvas or GPU. Nothing after start-up returns an error.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no global `window`")]
    NoWindow,
    #[error("no document on window")]
    NoDocument,
    #[error("no body on document")]
    NoBody,
    #[error("failed to create canvas: {0}")]
    Canvas(String),
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter found: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

#[cfg(target_arch = "wasm32")]
impl From<InitError> for wasm_bindgen::JsValue {
    fn from(err: InitError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
