//! Typed call and registration surface.
//!
//! The core works on ordered lists of JSON argument texts. This module
//! regenerates the per-arity ergonomics on top of it: argument tuples of up
//! to eight `Serialize` values on the way out, tuples of up to eight
//! `DeserializeOwned` values on the way in.

use jsbridge_common::{BridgeError, HostError, Result, StructuredError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

use crate::bridge::Bridge;
use crate::registry::{HostFunction, HostResult};

/// Values that can be passed as the positional arguments of a guest call.
pub trait IntoArguments {
    fn into_arguments(self) -> Result<Vec<String>>;
}

impl IntoArguments for () {
    fn into_arguments(self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

impl IntoArguments for Vec<Value> {
    fn into_arguments(self) -> Result<Vec<String>> {
        Ok(self.iter().map(Value::to_string).collect())
    }
}

/// Positional parameters of a guest → host call, decoded from JSON text.
///
/// Missing trailing parameters decode from `null`, the way JavaScript
/// leaves omitted parameters `undefined`; extra parameters are ignored.
pub trait FromArguments: Sized {
    fn from_arguments(params: &[String]) -> std::result::Result<Self, HostError>;
}

impl FromArguments for () {
    fn from_arguments(_params: &[String]) -> std::result::Result<Self, HostError> {
        Ok(())
    }
}

impl FromArguments for Vec<Value> {
    fn from_arguments(params: &[String]) -> std::result::Result<Self, HostError> {
        let mut reader = ParamReader::new(params);
        params.iter().map(|_| reader.next()).collect()
    }
}

struct ParamReader<'a> {
    params: &'a [String],
    index: usize,
}

impl<'a> ParamReader<'a> {
    fn new(params: &'a [String]) -> Self {
        Self { params, index: 0 }
    }

    fn next<T: DeserializeOwned>(&mut self) -> std::result::Result<T, HostError> {
        let index = self.index;
        self.index += 1;
        let text = self.params.get(index).map(String::as_str).unwrap_or("null");
        serde_json::from_str(text).map_err(|e| {
            StructuredError::new("TypeError", format!("invalid argument {}: {}", index, e)).into()
        })
    }
}

macro_rules! tuple_arguments {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> IntoArguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Result<Vec<String>> {
                let ($($name,)+) = self;
                Ok(vec![$(serde_json::to_string(&$name)?),+])
            }
        }

        impl<$($name: DeserializeOwned),+> FromArguments for ($($name,)+) {
            fn from_arguments(params: &[String]) -> std::result::Result<Self, HostError> {
                let mut reader = ParamReader::new(params);
                Ok(($(reader.next::<$name>()?,)+))
            }
        }
    };
}

tuple_arguments!(A);
tuple_arguments!(A, B);
tuple_arguments!(A, B, C);
tuple_arguments!(A, B, C, D);
tuple_arguments!(A, B, C, D, E);
tuple_arguments!(A, B, C, D, E, F);
tuple_arguments!(A, B, C, D, E, F, G);
tuple_arguments!(A, B, C, D, E, F, G, H);

async fn run_typed<R, Fut>(call: std::result::Result<Fut, HostError>) -> HostResult
where
    R: Serialize,
    Fut: Future<Output = std::result::Result<R, HostError>>,
{
    let value = call?.await?;
    Ok(serde_json::to_string(&value)?)
}

impl Bridge {
    /// Calls a guest function with typed arguments and decodes its result.
    ///
    /// ```ignore
    /// let sum: i64 = bridge.call("(a, b) => a + b", (1, 2)).await?;
    /// let greeting: String = bridge.call("Greeter.hello", ("world",)).await?;
    /// bridge.call::<()>("App.reset", ()).await?;
    /// ```
    pub async fn call<R>(&self, function: &str, args: impl IntoArguments) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let args = args.into_arguments()?;
        let raw = self.call_raw(function, args).await?;
        serde_json::from_str(&raw).map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    /// Registers a synchronous host function with typed parameters.
    ///
    /// ```ignore
    /// bridge.register_fn("Host.increment", |(n,): (i64,)| Ok(n + 1)).await?;
    /// ```
    pub async fn register_fn<A, R, F>(&self, name: &str, f: F) -> Result<()>
    where
        A: FromArguments + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> std::result::Result<R, HostError> + Send + Sync + 'static,
    {
        let function = HostFunction::from_sync(move |params: Vec<String>| -> HostResult {
            let value = f(A::from_arguments(&params)?)?;
            Ok(serde_json::to_string(&value)?)
        });
        self.register(name, function).await
    }

    /// Registers an asynchronous host function with typed parameters.
    pub async fn register_async<A, R, F, Fut>(&self, name: &str, f: F) -> Result<()>
    where
        A: FromArguments + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HostError>> + Send + 'static,
    {
        let function = HostFunction::from_async(move |params: Vec<String>| {
            run_typed(A::from_arguments(&params).map(&f))
        });
        self.register(name, function).await
    }
}
