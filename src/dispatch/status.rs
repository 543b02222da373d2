//! Translation of `Invoke` status codes into errors.

use crate::{native::HResult, wire::ExcepInfo, Error, Result};

/// Translates the status of an `Invoke` call on `member`.
///
/// `caller_index` maps the argument block slot reported through `arg_err` to the caller's
/// argument position. Status codes that the binder's own argument construction rules out
/// (bad variant type, unknown interface, unknown locale, parameter not found) become
/// [`Error::Com`].
pub(crate) fn check(
    hresult: HResult,
    member: &str,
    excep_info: &mut ExcepInfo,
    arg_err: u32,
    caller_index: impl Fn(u32) -> Option<usize>,
) -> Result<()> {
    if hresult.is_success() {
        return Ok(());
    }

    let member = member.to_string();
    Err(match hresult {
        HResult::DISP_E_BADPARAMCOUNT => Error::BadParamCount(member),
        HResult::DISP_E_EXCEPTION => Error::Exception(excep_info.take_exception()),
        HResult::DISP_E_MEMBERNOTFOUND => Error::MemberNotFound(member),
        HResult::DISP_E_NONAMEDARGS => Error::NoNamedArgs(member),
        HResult::DISP_E_OVERFLOW => Error::Overflow(member),
        HResult::DISP_E_PARAMNOTOPTIONAL => Error::ParamNotOptional(member),
        HResult::DISP_E_TYPEMISMATCH => Error::TypeMismatch {
            index: caller_index(arg_err).unwrap_or(arg_err as usize),
            member,
        },
        _ => Error::Com { hresult, member },
    })
}
