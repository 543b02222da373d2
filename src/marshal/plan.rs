//! The per-call argument plan.
//!
//! Arguments are put into their logical call order: positional arguments, then named
//! arguments, then the assigned value of a property write. The argument block stores that
//! order reversed, so the plan keeps the mapping between block slots and the caller's
//! argument positions for error reporting and by-reference write-back.

use crate::{
    marshal::{ArgPlanEntry, TypeSelector},
    types::Argument,
    wire::Variant,
    Result,
};

pub(crate) struct ArgumentPlan {
    entries: Vec<ArgPlanEntry>,
    /// Caller index of each logical position
    order: Vec<usize>,
    named: usize,
}

impl ArgumentPlan {
    /// Selects every argument. With `assigns`, the last caller argument is the value of a
    /// property write and goes last regardless of its name.
    pub(crate) fn new(selector: &TypeSelector, args: &[Argument], assigns: bool) -> Result<Self> {
        let assigned = if assigns { args.len().checked_sub(1) } else { None };
        let leading = assigned.unwrap_or(args.len());

        let mut order: Vec<usize> = (0..leading).filter(|&i| args[i].name.is_none()).collect();
        let positional = order.len();
        order.extend((0..leading).filter(|&i| args[i].name.is_some()));
        let named = order.len() - positional;
        order.extend(assigned);

        let mut entries = Vec::with_capacity(order.len());
        for &index in &order {
            entries.push(selector.select(&args[index])?);
        }

        Ok(ArgumentPlan {
            entries,
            order,
            named,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Names of the named arguments in logical order, which is their caller order.
    pub(crate) fn named_names(args: &[Argument], assigns: bool) -> Vec<&str> {
        let leading = if assigns {
            args.len().saturating_sub(1)
        } else {
            args.len()
        };
        args[..leading]
            .iter()
            .filter_map(|arg| arg.name.as_deref())
            .collect()
    }

    /// Number of named arguments, excluding the assigned value.
    pub(crate) fn named_count(&self) -> usize {
        self.named
    }

    /// Writes every argument into `slots`, which is in argument block (reversed) order.
    pub(crate) fn populate(&mut self, args: &mut [Argument], slots: &mut [Variant]) -> Result<()> {
        debug_assert_eq!(slots.len(), self.entries.len());
        let count = self.entries.len();
        for (logical, entry) in self.entries.iter_mut().enumerate() {
            let slot = &mut slots[count - 1 - logical];
            let arg = &mut args[self.order[logical]];
            if entry.vt.is_byref() {
                entry.temp = entry.marshaler.marshal_ref(entry.vt, &mut arg.value, slot)?;
            } else {
                entry.marshaler.marshal(&arg.value, slot)?;
            }
        }
        Ok(())
    }

    /// Caller position of the argument in block slot `slot`.
    pub(crate) fn caller_index(&self, slot: u32) -> Option<usize> {
        let logical = self.order.len().checked_sub(1 + slot as usize)?;
        self.order.get(logical).copied()
    }

    /// Reads every by-reference temporary back into the caller's arguments.
    ///
    /// All temporaries are processed; the first failure is returned.
    pub(crate) fn write_back(&mut self, args: &mut [Argument]) -> Result<()> {
        let mut outcome = Ok(());
        for (logical, entry) in self.entries.iter_mut().enumerate() {
            let Some(temp) = entry.temp.as_mut() else {
                continue;
            };
            let arg = &mut args[self.order[logical]];
            match entry
                .marshaler
                .unmarshal_ref(entry.vt.without_byref(), temp, &arg.value)
            {
                Ok(value) => arg.value = value,
                Err(error) => {
                    if outcome.is_ok() {
                        outcome = Err(error);
                    }
                }
            }
        }
        outcome
    }
}
