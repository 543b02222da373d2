//! The object handed to connection points.

use std::sync::Weak;

use log::debug;
use uguid::Guid;

use crate::{
    events::EventSink,
    native::{
        DispId, Dispatch, HResult, InvokeFlags, Lcid, Unknown, IID_IDISPATCH, IID_IUNKNOWN,
    },
    types::Value,
    wire::{DispParams, ExcepInfo, Variant},
};

/// Source name reported in the exception info of a failing handler.
const EXCEPTION_SOURCE: &str = "dispbind";

/// Receives events for one [`EventSink`].
///
/// The proxy only implements the generic dispatch interface but claims the advised source
/// interface as well, so connection points accept it as a sink of that interface. It holds
/// its sink weakly; events arriving after the sink is gone, or after it was released from
/// this interface, are ignored.
///
/// Arguments are passed to handlers by value. Slots the source passes by reference are read
/// but never written back.
pub struct SinkProxy {
    sink: Weak<EventSink>,
    source_iid: Guid,
}

impl SinkProxy {
    pub(crate) fn new(sink: Weak<EventSink>, source_iid: Guid) -> Self {
        SinkProxy { sink, source_iid }
    }
}

impl Unknown for SinkProxy {
    fn as_dispatch(&self) -> Option<&dyn Dispatch> {
        Some(self)
    }

    fn supports_interface(&self, iid: &Guid) -> bool {
        *iid == IID_IUNKNOWN || *iid == IID_IDISPATCH || *iid == self.source_iid
    }
}

impl Dispatch for SinkProxy {
    fn ids_of_names(&self, _names: &[&str], _lcid: Lcid) -> Result<Vec<DispId>, HResult> {
        Err(HResult::E_NOTIMPL)
    }

    fn invoke(
        &self,
        member: DispId,
        _lcid: Lcid,
        _flags: InvokeFlags,
        params: &mut DispParams,
        result: &mut Variant,
        excep_info: &mut ExcepInfo,
        arg_err: &mut u32,
    ) -> HResult {
        let Some(sink) = self.sink.upgrade() else {
            return HResult::S_OK;
        };
        let handlers = sink.handlers(self.source_iid, member);
        drop(sink);
        if handlers.is_empty() {
            return HResult::S_OK;
        }

        let slots = params.args();
        let mut args = Vec::with_capacity(slots.len());
        for (slot, variant) in slots.iter().enumerate().rev() {
            match variant.to_value() {
                Ok(value) => args.push(value),
                Err(error) => {
                    debug!("Event {} argument {} not convertible: {}", member, slot, error);
                    *arg_err = slot as u32;
                    return HResult::DISP_E_TYPEMISMATCH;
                }
            }
        }

        let mut last = Value::Empty;
        for handler in &handlers {
            match handler(&args) {
                Ok(value) => last = value,
                Err(error) => {
                    let code = error.hresult().unwrap_or(HResult::E_FAIL);
                    excep_info.fill(
                        code,
                        Some(EXCEPTION_SOURCE),
                        Some(&error.to_string()),
                        None,
                        0,
                    );
                    return HResult::DISP_E_EXCEPTION;
                }
            }
        }

        if !last.is_empty() {
            result.clear();
            if let Err(error) = result.set_value(&last) {
                debug!("Result of event {} not convertible: {}", member, error);
                return HResult::DISP_E_TYPEMISMATCH;
            }
        }
        HResult::S_OK
    }
}
