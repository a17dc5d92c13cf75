//! Object allocation via a generated `TryAllocate<Class>` stub.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Instruction, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::register::Register;

use super::{Handler, Matched};

/// `BL` to a stub named `Allocate<Class>Stub`. The allocated object is
/// returned in the AOT calling convention's result register; the class name
/// is recovered from the stub's own name rather than from a pool load,
/// since the class is baked into the stub at snapshot-build time.
pub struct TryAllocateObject;

impl Handler for TryAllocateObject {
    fn name(&self) -> &'static str {
        "TryAllocateObject"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Bl {
            return Ok(None);
        }
        let Some(target) = first.imm_operand(0) else { return Ok(None) };
        let Some(callee) = app.function_at(target as u64) else { return Ok(None) };
        if !callee.name.starts_with("Allocate") {
            return Ok(None);
        }
        let class_name = callee
            .name
            .strip_prefix("Allocate")
            .and_then(|s| s.strip_suffix("Stub"))
            .unwrap_or(&callee.name)
            .to_string();
        Ok(Some(Matched::new(1, IlNode::AllocateObject { dst: Register::X(0), class_name })))
    }
}
