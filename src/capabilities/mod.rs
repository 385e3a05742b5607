//! Capabilities the core requests from the shell: rendering, HTTP, and
//! key-value persistence. The shell executes each effect and resolves it
//! back into the event loop.

pub mod http;
pub mod kv;

pub use http::{Http, HttpError, HttpMethod, HttpOperation, HttpRequest, HttpResponse, HttpResult};
pub use kv::{KeyValue, KvError, KvOperation, KvOutput, KvResult};

use crux_core::render::Render;

use crate::app::{App, Event};
// The Effect derive names each variant after the field's type, and the
// shell/tests expect the variant `Effect::Kv`.
use kv::KeyValue as Kv;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub kv: Kv<Event>,
}
