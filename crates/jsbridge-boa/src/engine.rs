//! Engine thread.
//!
//! Boa's `Context` is neither `Send` nor `Sync`, so each transport owns one
//! dedicated thread that creates the context and runs every command against
//! it in arrival order.
//!
//! The page's host-facing surface is native: `jsbridgeHost.postMessage`
//! writes into a Rust-side outbox, `console` logs straight to `tracing` and
//! `localStorage` writes go to the [`DataStore`] as they happen. After each
//! script the thread runs pending promise jobs and forwards the outbox.

use boa_engine::object::{FunctionObjectBuilder, JsObject};
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source,
};
use jsbridge_common::{BridgeError, PageRequest, Result, TransportEvent};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::Level;

use crate::storage::{DataStore, StorageItems};

const PAGE_BOOTSTRAP: &str = include_str!("page.js");
const GUEST_TARGET: &str = "jsbridge::guest";

#[derive(Debug)]
pub(crate) enum Command {
    Load(PageRequest),
    Evaluate(String),
    Close,
}

/// Messages posted by the page since the last flush.
type Outbox = Rc<RefCell<Vec<String>>>;

struct Page {
    context: Context,
    outbox: Outbox,
}

struct Engine {
    page: Option<Page>,
    store: DataStore,
    events: UnboundedSender<TransportEvent>,
}

/// Starts an engine thread and returns the sender for its commands.
pub(crate) fn spawn(
    store: DataStore,
    events: UnboundedSender<TransportEvent>,
) -> Result<UnboundedSender<Command>> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    thread::Builder::new()
        .name("jsbridge-boa".into())
        .spawn(move || {
            let engine = Engine {
                page: None,
                store,
                events,
            };
            engine.run(commands_rx);
        })
        .map_err(|e| BridgeError::Transport(format!("failed to start engine thread: {}", e)))?;

    Ok(commands_tx)
}

impl Engine {
    fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.blocking_recv() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match command {
                Command::Load(request) => {
                    self.load(request);
                    true
                }
                Command::Evaluate(script) => {
                    self.evaluate(&script);
                    true
                }
                Command::Close => false,
            }));

            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("engine closed");
                    return;
                }
                Err(_) => {
                    tracing::error!("engine panicked");
                    let _ = self
                        .events
                        .send(TransportEvent::Terminated("engine panicked".into()));
                    return;
                }
            }
        }
        tracing::debug!("engine command channel closed");
    }

    fn load(&mut self, request: PageRequest) {
        let (seed, storage) = if request.incognito {
            (StorageItems::new(), None)
        } else {
            let storage = PageStorage {
                store: self.store.clone(),
                origin: request.origin.clone(),
            };
            (self.store.snapshot(&request.origin), Some(storage))
        };

        let mut context = Context::default();
        let outbox = Outbox::default();
        if let Err(e) = install_page(&mut context, &request.origin, &seed, &outbox, storage) {
            self.send(TransportEvent::LoadFailed(format!("page bootstrap failed: {}", e)));
            return;
        }

        tracing::info!(origin = %request.origin, incognito = request.incognito, "page loaded");
        self.page = Some(Page { context, outbox });
        self.send(TransportEvent::Loaded);
    }

    fn evaluate(&mut self, script: &str) {
        let Some(page) = self.page.as_mut() else {
            tracing::warn!("script evaluated before the page loaded");
            return;
        };

        if let Err(e) = page.context.eval(Source::from_bytes(script)) {
            tracing::warn!(error = %e, "script threw");
        }
        if let Err(e) = page.context.run_jobs() {
            tracing::warn!(error = %e, "promise job failed");
        }

        let messages = std::mem::take(&mut *page.outbox.borrow_mut());
        for message in messages {
            self.send(TransportEvent::Message(message));
        }
    }

    fn send(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Where a non-incognito page writes its `localStorage` changes.
#[derive(Clone)]
struct PageStorage {
    store: DataStore,
    origin: String,
}

/// Installs the native host surface, then runs the page script over it.
///
/// # Errors
///
/// Returns the JavaScript error raised while building the page.
fn install_page(
    context: &mut Context,
    origin: &str,
    seed: &StorageItems,
    outbox: &Outbox,
    storage: Option<PageStorage>,
) -> JsResult<()> {
    let host = JsObject::default(context.intrinsics());
    let outbox = outbox.clone();
    let post_message = closure_binding(move |_this, args, context| {
        let message = string_arg(args, 0, context)?;
        outbox.borrow_mut().push(message);
        Ok(JsValue::undefined())
    });
    set_function(&host, js_string!("postMessage"), post_message, context)?;
    context.register_global_property(js_string!("jsbridgeHost"), host, Attribute::all())?;

    let console = JsObject::default(context.intrinsics());
    for (name, level) in [
        (js_string!("log"), Level::INFO),
        (js_string!("info"), Level::INFO),
        (js_string!("debug"), Level::DEBUG),
        (js_string!("warn"), Level::WARN),
        (js_string!("error"), Level::ERROR),
    ] {
        set_function(&console, name, console_binding(level), context)?;
    }
    context.register_global_property(js_string!("console"), console, Attribute::all())?;

    let seed_object = JsObject::default(context.intrinsics());
    for (key, value) in seed {
        seed_object.set(JsString::from(key.as_str()), JsString::from(value.as_str()), false, context)?;
    }
    let storage = match storage {
        Some(storage) => storage_bindings(storage, context)?.into(),
        None => JsValue::undefined(),
    };

    let bootstrap = context.eval(Source::from_bytes(PAGE_BOOTSTRAP))?;
    let Some(bootstrap) = bootstrap.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message("page script did not produce a function")
            .into());
    };
    let args = [
        context.global_object().into(),
        JsString::from(origin).into(),
        seed_object.into(),
        storage,
    ];
    bootstrap.call(&JsValue::undefined(), &args, context)?;
    Ok(())
}

/// Builds the `set`/`remove`/`clear` hooks the page's `localStorage` calls
/// after each change.
fn storage_bindings(storage: PageStorage, context: &mut Context) -> JsResult<JsObject> {
    let hooks = JsObject::default(context.intrinsics());

    let target = storage.clone();
    let set = closure_binding(move |_this, args, context| {
        let key = string_arg(args, 0, context)?;
        let value = string_arg(args, 1, context)?;
        target.store.set(&target.origin, key, value);
        Ok(JsValue::undefined())
    });
    set_function(&hooks, js_string!("set"), set, context)?;

    let target = storage.clone();
    let remove = closure_binding(move |_this, args, context| {
        let key = string_arg(args, 0, context)?;
        target.store.remove(&target.origin, &key);
        Ok(JsValue::undefined())
    });
    set_function(&hooks, js_string!("remove"), remove, context)?;

    let clear = closure_binding(move |_this, _args, _context| {
        storage.store.clear(&storage.origin);
        Ok(JsValue::undefined())
    });
    set_function(&hooks, js_string!("clear"), clear, context)?;

    Ok(hooks)
}

/// Wraps a closure whose captures live outside the garbage collector.
fn closure_binding<F>(closure: F) -> NativeFunction
where
    F: Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
{
    // SAFETY: every caller captures only Rust-owned data (the outbox or a
    // storage handle), never a `Gc` pointer or other traced value.
    unsafe { NativeFunction::from_closure(closure) }
}

fn console_binding(level: Level) -> NativeFunction {
    NativeFunction::from_copy_closure(move |_this, args, _context| {
        let line = console_line(args);
        if level == Level::ERROR {
            tracing::error!(target: GUEST_TARGET, "{}", line);
        } else if level == Level::WARN {
            tracing::warn!(target: GUEST_TARGET, "{}", line);
        } else if level == Level::DEBUG {
            tracing::debug!(target: GUEST_TARGET, "{}", line);
        } else {
            tracing::info!(target: GUEST_TARGET, "{}", line);
        }
        Ok(JsValue::undefined())
    })
}

/// Joins console arguments the way browsers print them: strings verbatim,
/// everything else in its display form.
fn console_line(args: &[JsValue]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|value| match value.as_string() {
            Some(text) => text.to_std_string_lossy(),
            None => value.display().to_string(),
        })
        .collect();
    parts.join(" ")
}

/// Reads argument `index` as a string, applying JavaScript's `String()`
/// conversion.
///
/// # Errors
///
/// Propagates a throwing `toString`, and rejects text that is not valid UTF-16.
fn string_arg(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<String> {
    let value = args.get(index).cloned().unwrap_or_else(JsValue::undefined);
    value.to_string(context)?.to_std_string().map_err(|e| {
        JsNativeError::typ()
            .with_message(format!("argument {} is not valid UTF-16: {:?}", index, e))
            .into()
    })
}

fn set_function(
    object: &JsObject,
    name: JsString,
    native: NativeFunction,
    context: &mut Context,
) -> JsResult<()> {
    let function = FunctionObjectBuilder::new(context.realm(), native).build();
    object.set(name, function, false, context)?;
    Ok(())
}
