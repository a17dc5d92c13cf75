//! Recovered parameter descriptors, and their textual rendering.
//!
//! Grounded on the original tool's `FnParamInfo`/`FnParams::ToString()`
//! (`original blutter CodeAnalyzer.cpp`): positional-optional parameters
//! render inside `[...]`, named parameters inside `{...}`, each with an
//! inline comment showing the register or frame-pointer offset it was
//! recovered from.

use crate::register::Register;
use crate::var::VarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Dynamic,
    Int,
    Double,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamType::Dynamic => write!(f, "dynamic"),
            ParamType::Int => write!(f, "int"),
            ParamType::Double => write!(f, "double"),
        }
    }
}

/// One recovered parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FnParamInfo {
    /// Register holding the argument value on entry, before any spill.
    pub value_reg: Option<Register>,
    /// FP-relative offset of a recovered spill slot, if the prologue stored
    /// the parameter to the stack.
    pub local_offset: Option<i32>,
    pub declared_type: ParamType,
    pub name: Option<String>,
    pub default_value: Option<VarValue>,
}

impl FnParamInfo {
    pub fn positional(value_reg: Register, declared_type: ParamType) -> Self {
        FnParamInfo {
            value_reg: Some(value_reg),
            local_offset: None,
            declared_type,
            name: None,
            default_value: None,
        }
    }

    fn to_string_part(&self) -> String {
        let ty = self.declared_type;
        let name = self.name.as_deref().unwrap_or("_");
        let mut s = format!("{ty} {name}");
        if let Some(v) = &self.default_value {
            s.push_str(&format!(" = {v:?}"));
        }
        let loc = match (self.value_reg, self.local_offset) {
            (Some(r), Some(o)) => format!(" /* {r}, fp{o:+} */"),
            (Some(r), None) => format!(" /* {r} */"),
            (None, Some(o)) => format!(" /* fp{o:+} */"),
            (None, None) => String::new(),
        };
        s + &loc
    }
}

/// The full recovered parameter list for one function.
#[derive(Debug, Clone, Default)]
pub struct FnParams {
    pub params: Vec<FnParamInfo>,
    pub num_fixed_param: u32,
    pub is_named_param: bool,
}

impl FnParams {
    pub fn new(num_fixed_param: u32) -> Self {
        FnParams { params: Vec::new(), num_fixed_param, is_named_param: false }
    }

    pub fn push(&mut self, param: FnParamInfo) {
        self.params.push(param);
    }
}

impl std::fmt::Display for FnParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        let fixed = &self.params[..self.num_fixed_param.min(self.params.len() as u32) as usize];
        let rest = &self.params[fixed.len()..];
        let mut parts: Vec<String> = fixed.iter().map(FnParamInfo::to_string_part).collect();
        if !rest.is_empty() {
            let (open, close) = if self.is_named_param { ('{', '}') } else { ('[', ']') };
            let inner: Vec<String> = rest.iter().map(FnParamInfo::to_string_part).collect();
            parts.push(format!("{open}{}{close}", inner.join(", ")));
        }
        write!(f, "{})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_and_optional_positional() {
        let mut params = FnParams::new(1);
        params.push(FnParamInfo::positional(Register::X(1), ParamType::Dynamic));
        let mut opt = FnParamInfo::positional(Register::X(2), ParamType::Int);
        opt.name = Some("count".to_string());
        opt.default_value = Some(VarValue::integer(0, crate::var::IntKind::Smi));
        params.push(opt);
        let text = params.to_string();
        assert!(text.starts_with("(dynamic _"));
        assert!(text.contains('['));
    }

    #[test]
    fn renders_named_with_braces() {
        let mut params = FnParams::new(1);
        params.push(FnParamInfo::positional(Register::X(1), ParamType::Dynamic));
        let mut named = FnParamInfo::positional(Register::X(2), ParamType::Dynamic);
        named.name = Some("label".to_string());
        params.is_named_param = true;
        params.push(named);
        assert!(params.to_string().contains('{'));
    }
}
