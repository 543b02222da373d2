//! Benchmarks for late-bound invocation.
//!
//! Measures the layers of one call separately:
//! - Wire value encode and decode
//! - The invocation pipeline with positional, by-reference and named arguments
//! - Binder resolution with a warm type cache, with and without type metadata

extern crate dispbind;

use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, Criterion};
use dispbind::{
    dispatch::{invoke, Invocation},
    native::{
        ComObject, ComPtr, DispId, Dispatch, Documentation, FuncDesc, FuncFlags, HResult,
        InvokeFlags, Lcid, TypeAttr, TypeInfo, TypeKind, Unknown, MEMBERID_NIL,
    },
    prelude::{Argument, ComBinder, Value},
    wire::{DispParams, ExcepInfo, VarType, Variant},
};
use uguid::guid;

const SUM: DispId = 1;
const COUNT: DispId = 2;

/// Adds up its integer arguments and reports a constant count.
struct Adder {
    typed: bool,
}

struct AdderInfo;

impl Unknown for Adder {
    fn as_dispatch(&self) -> Option<&dyn Dispatch> {
        Some(self)
    }
}

impl Dispatch for Adder {
    fn type_info_count(&self) -> u32 {
        u32::from(self.typed)
    }

    fn type_info(&self, _index: u32, _lcid: Lcid) -> Result<Arc<dyn TypeInfo>, HResult> {
        Ok(Arc::new(AdderInfo))
    }

    fn ids_of_names(&self, names: &[&str], _lcid: Lcid) -> Result<Vec<DispId>, HResult> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| match (index, name.to_ascii_uppercase().as_str()) {
                (0, "SUM") => Ok(SUM),
                (0, "COUNT") => Ok(COUNT),
                (_, "STEP") => Ok(100),
                _ => Err(HResult::DISP_E_UNKNOWNNAME),
            })
            .collect()
    }

    fn invoke(
        &self,
        member: DispId,
        _lcid: Lcid,
        _flags: InvokeFlags,
        params: &mut DispParams,
        result: &mut Variant,
        _excep_info: &mut ExcepInfo,
        _arg_err: &mut u32,
    ) -> HResult {
        match member {
            SUM => {
                let total = params
                    .args()
                    .iter()
                    .filter_map(|slot| match slot.to_value() {
                        Ok(Value::I32(n)) => Some(n),
                        _ => None,
                    })
                    .sum();
                result.set_i4(total);
                HResult::S_OK
            }
            COUNT => {
                result.set_i4(3);
                HResult::S_OK
            }
            _ => HResult::DISP_E_MEMBERNOTFOUND,
        }
    }
}

impl TypeInfo for AdderInfo {
    fn type_attr(&self) -> Result<TypeAttr, HResult> {
        Ok(TypeAttr {
            guid: guid!("7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d"),
            kind: TypeKind::Dispatch,
            func_count: 1,
            var_count: 0,
            impl_type_count: 0,
        })
    }

    fn func_desc(&self, _index: u32) -> Result<FuncDesc, HResult> {
        Ok(FuncDesc {
            member_id: COUNT,
            invoke_kind: InvokeFlags::PROPERTYGET,
            param_count: 0,
            optional_param_count: 0,
            flags: FuncFlags::empty(),
            return_type: VarType::I4,
        })
    }

    fn names(&self, _member_id: DispId) -> Result<Vec<String>, HResult> {
        Ok(vec!["Count".to_string()])
    }

    fn documentation(&self, member_id: DispId) -> Result<Documentation, HResult> {
        let name = if member_id == MEMBERID_NIL { "Adder" } else { "Count" };
        Ok(Documentation {
            name: name.to_string(),
            ..Documentation::default()
        })
    }
}

fn adder(typed: bool) -> ComPtr {
    ComObject::new(Adder { typed })
}

/// Encoding and decoding a string wire value, including the native string allocation.
fn bench_variant_string(c: &mut Criterion) {
    let value = Value::from("The quick brown fox");

    c.bench_function("variant_string_roundtrip", |b| {
        b.iter(|| {
            let variant = Variant::from_value(black_box(&value)).unwrap();
            black_box(variant.to_value().unwrap())
        });
    });
}

/// A direct call with three positional integers.
fn bench_invoke_positional(c: &mut Criterion) {
    let object = adder(false);
    let call = Invocation::new("Sum", SUM, InvokeFlags::METHOD);

    c.bench_function("invoke_positional_3", |b| {
        b.iter(|| {
            let mut args = [Argument::new(1), Argument::new(2), Argument::new(3)];
            black_box(invoke(&object, &call, &mut args).unwrap())
        });
    });
}

/// A direct call with a by-reference argument that is written back.
fn bench_invoke_by_ref(c: &mut Criterion) {
    let object = adder(false);
    let call = Invocation::new("Sum", SUM, InvokeFlags::METHOD);

    c.bench_function("invoke_by_ref", |b| {
        b.iter(|| {
            let mut args = [Argument::by_ref(20), Argument::new(22)];
            black_box(invoke(&object, &call, &mut args).unwrap())
        });
    });
}

/// A direct call with a named argument, which adds a name lookup.
fn bench_invoke_named(c: &mut Criterion) {
    let object = adder(false);
    let call = Invocation::new("Sum", SUM, InvokeFlags::METHOD);

    c.bench_function("invoke_named", |b| {
        b.iter(|| {
            let mut args = [Argument::new(1), Argument::named("Step", 2)];
            black_box(invoke(&object, &call, &mut args).unwrap())
        });
    });
}

/// Get-member resolved from cached type metadata.
fn bench_binder_structured(c: &mut Criterion) {
    let binder = ComBinder::new();
    let object = adder(true);
    binder.get_member(&object, "Count").unwrap();

    c.bench_function("binder_get_member_structured", |b| {
        b.iter(|| black_box(binder.get_member(&object, black_box("Count")).unwrap()));
    });
}

/// Invoke-member resolved from the per-object late-bound descriptor.
fn bench_binder_late_bound(c: &mut Criterion) {
    let binder = ComBinder::new();
    let object = adder(false);
    binder.invoke_member(&object, "Sum", &mut []).unwrap();

    c.bench_function("binder_invoke_member_late_bound", |b| {
        b.iter(|| {
            let mut args = [Argument::new(1), Argument::new(2)];
            black_box(binder.invoke_member(&object, black_box("Sum"), &mut args).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_variant_string,
    bench_invoke_positional,
    bench_invoke_by_ref,
    bench_invoke_named,
    bench_binder_structured,
    bench_binder_late_bound,
);
criterion_main!(benches);
