//! Instruction listing → [`CompiledTemplate`].
//!
//! Structured blocks are lowered to jumps with backpatching. While
//! assembling, each function records which listing line produced each
//! instruction, in the same `(offset, line)` checkpoint form a bytecode
//! builder's `set_line` produces.
//!
//! Any failure here means the generator wrote something the assembler does
//! not accept, so errors carry the full numbered listing.

use kiln_diagnostic::GenerationError;
use kiln_ir::{Expr, LineTableBuilder, Literal, Mode, Param, MAIN_FUNCTION};
use kiln_markup::expr::{is_identifier, parse_for_each, parse_signature};
use kiln_markup::parse_expr;
use tracing::{debug, error};

use crate::compiled::{CompiledTemplate, Instr, TemplateFunction};

/// Assemble a generated listing.
pub fn assemble(text: &str, filename: &str, mode: Mode) -> Result<CompiledTemplate, GenerationError> {
    let mut asm = Assembler {
        file: filename,
        text,
        line: 0,
        functions: Vec::new(),
        current: None,
    };
    let result = asm.run();
    match result {
        Ok(()) => {
            debug!(file = filename, functions = asm.functions.len(), "assembled template");
            Ok(CompiledTemplate::new(filename, mode, text.to_owned(), asm.functions))
        }
        Err(err) => {
            error!(file = filename, line = err.line, message = %err.message, listing = %err.listing, "assembly failed");
            Err(err)
        }
    }
}

/// An open structured block awaiting its `end`.
enum Block {
    If { test_pc: usize, else_pc: Option<usize> },
    For { next_pc: usize },
    Switch { exits: Vec<usize> },
    Case { case_pc: usize },
    With,
    Collect(Box<str>),
}

struct FunctionBuilder {
    name: String,
    params: Vec<Param>,
    code: Vec<Instr>,
    lines: LineTableBuilder,
    blocks: Vec<Block>,
}

struct Assembler<'a> {
    file: &'a str,
    text: &'a str,
    /// Current listing line, 1-based.
    line: u32,
    functions: Vec<TemplateFunction>,
    current: Option<FunctionBuilder>,
}

impl Assembler<'_> {
    fn error(&self, message: impl Into<String>) -> GenerationError {
        GenerationError::new(self.file, self.line, message, self.text)
    }

    fn run(&mut self) -> Result<(), GenerationError> {
        let text = self.text;
        for (number, raw) in (1u32..).zip(text.lines()) {
            self.line = number;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (op, operand) = line.split_once(' ').unwrap_or((line, ""));
            self.instruction(op, operand.trim())?;
        }
        if let Some(function) = &self.current {
            return Err(self.error(format!("`def {}` is never closed", function.name)));
        }
        match self.functions.first() {
            Some(main) if main.name == MAIN_FUNCTION => Ok(()),
            _ => Err(self.error(format!("the first function must be `{MAIN_FUNCTION}`"))),
        }
    }

    fn expr(&self, src: &str) -> Result<Expr, GenerationError> {
        parse_expr(src).map_err(|e| self.error(format!("invalid expression `{src}`: {e}")))
    }

    fn string(&self, src: &str) -> Result<String, GenerationError> {
        match self.expr(src)? {
            Expr::Literal(Literal::Str(s)) => Ok(s),
            _ => Err(self.error("expected a string literal")),
        }
    }

    fn name(&self, src: &str) -> Result<String, GenerationError> {
        let name = src.trim();
        if is_identifier(name) {
            Ok(name.to_owned())
        } else {
            Err(self.error(format!("`{name}` is not a valid name")))
        }
    }

    /// `name = expr`
    fn assignment(&self, src: &str) -> Result<(String, Expr), GenerationError> {
        let Some((name, value)) = src.split_once('=') else {
            return Err(self.error("expected `name = expression`"));
        };
        Ok((name.trim().to_owned(), self.expr(value.trim())?))
    }

    fn function(&mut self) -> Result<&mut FunctionBuilder, GenerationError> {
        match self.current.as_mut() {
            Some(function) => Ok(function),
            None => Err(GenerationError::new(
                self.file,
                self.line,
                "instruction outside of a `def`",
                self.text,
            )),
        }
    }

    /// Append an instruction produced by the current listing line.
    fn emit(&mut self, instr: Instr) -> Result<usize, GenerationError> {
        let line = self.line;
        let function = self.function()?;
        let pc = function.code.len();
        function.lines.mark(u32::try_from(pc).unwrap_or(u32::MAX), line);
        function.code.push(instr);
        Ok(pc)
    }

    fn open(&mut self, block: Block) -> Result<(), GenerationError> {
        self.function()?.blocks.push(block);
        Ok(())
    }

    fn instruction(&mut self, op: &str, operand: &str) -> Result<(), GenerationError> {
        match op {
            "def" => self.begin_function(operand)?,
            "end" => self.end()?,
            "text" => {
                let text = self.string(operand)?;
                self.emit(Instr::Text(text.into_boxed_str()))?;
            }
            "emit" => {
                let expr = self.expr(operand)?;
                self.emit(Instr::Emit(expr))?;
            }
            "attrs" => {
                let expr = self.expr(operand)?;
                self.emit(Instr::EmitAttrs(expr))?;
            }
            "call" => {
                let expr = self.expr(operand)?;
                self.emit(Instr::CallBlock(expr))?;
            }
            "if" => {
                let test = self.expr(operand)?;
                let test_pc = self.emit(Instr::JumpIfNot { test, target: 0 })?;
                self.open(Block::If { test_pc, else_pc: None })?;
            }
            "else" => {
                let else_pc = self.emit(Instr::Jump(0))?;
                let function = self.function()?;
                let Some(Block::If { test_pc, else_pc: slot @ None }) = function.blocks.last_mut() else {
                    return Err(self.error("`else` without an open `if`"));
                };
                let test_pc = *test_pc;
                *slot = Some(else_pc);
                patch(&mut function.code, test_pc, else_pc + 1);
            }
            "for" => {
                let (targets, iter) = parse_for_each(operand)
                    .map_err(|e| self.error(format!("invalid loop header `{operand}`: {e}")))?;
                self.emit(Instr::IterStart(iter))?;
                let next_pc = self.emit(Instr::IterNext { targets, exit: 0 })?;
                self.open(Block::For { next_pc })?;
            }
            "switch" => {
                let value = self.expr(operand)?;
                self.emit(Instr::PushSwitch(value))?;
                self.open(Block::Switch { exits: Vec::new() })?;
            }
            "case" | "default" => {
                if !matches!(self.function()?.blocks.last(), Some(Block::Switch { .. })) {
                    return Err(self.error(format!("`{op}` outside of a `switch`")));
                }
                let value = if op == "case" { Some(self.expr(operand)?) } else { None };
                let case_pc = self.emit(Instr::Case { value, target: 0 })?;
                self.open(Block::Case { case_pc })?;
            }
            "with" => {
                let names = operand
                    .split(',')
                    .map(|name| self.name(name))
                    .collect::<Result<Vec<_>, _>>()?;
                self.emit(Instr::PushWith(names))?;
                self.open(Block::With)?;
            }
            "let" => {
                if !matches!(self.function()?.blocks.last(), Some(Block::With)) {
                    return Err(self.error("`let` outside of a `with`"));
                }
                let (name, value) = self.assignment(operand)?;
                self.emit(Instr::Assign { name, value })?;
            }
            "import" => {
                let (alias, href) = self.assignment(operand)?;
                let alias = match alias.as_str() {
                    "_" => None,
                    _ => Some(self.name(&alias)?),
                };
                self.emit(Instr::Import { alias, href })?;
            }
            "extend" => {
                let parent = self.expr(operand)?;
                self.emit(Instr::Extend(parent))?;
            }
            "collect" => {
                let attr = self.string(operand)?.into_boxed_str();
                self.emit(Instr::BeginCollect)?;
                self.open(Block::Collect(attr))?;
            }
            other => return Err(self.error(format!("unknown instruction `{other}`"))),
        }
        Ok(())
    }

    fn begin_function(&mut self, operand: &str) -> Result<(), GenerationError> {
        if self.current.is_some() {
            return Err(self.error("`def` inside another `def`"));
        }
        let (name, params) = parse_signature(operand)
            .map_err(|e| self.error(format!("invalid signature `{operand}`: {e}")))?;
        if self.functions.iter().any(|f| f.name == name) {
            return Err(self.error(format!("function `{name}` defined twice")));
        }
        self.current = Some(FunctionBuilder {
            name,
            params,
            code: Vec::new(),
            lines: LineTableBuilder::new(self.line),
            blocks: Vec::new(),
        });
        Ok(())
    }

    fn end(&mut self) -> Result<(), GenerationError> {
        let block = self.function()?.blocks.pop();
        match block {
            None => {
                if let Some(function) = self.current.take() {
                    self.functions.push(TemplateFunction {
                        name: function.name,
                        params: function.params,
                        code: function.code,
                        generated_lines: function.lines.clone().finish(),
                        lines: function.lines.finish(),
                    });
                }
            }
            Some(Block::If { test_pc, else_pc }) => {
                let to = self.function()?.code.len();
                let function = self.function()?;
                patch(&mut function.code, else_pc.unwrap_or(test_pc), to);
            }
            Some(Block::For { next_pc }) => {
                let jump = u32::try_from(next_pc).unwrap_or(u32::MAX);
                self.emit(Instr::Jump(jump))?;
                let function = self.function()?;
                let to = function.code.len();
                patch(&mut function.code, next_pc, to);
            }
            Some(Block::Switch { exits }) => {
                let pop_pc = self.emit(Instr::PopSwitch)?;
                let function = self.function()?;
                for exit in exits {
                    patch(&mut function.code, exit, pop_pc);
                }
            }
            Some(Block::Case { case_pc }) => {
                let exit = self.emit(Instr::Jump(0))?;
                let function = self.function()?;
                patch(&mut function.code, case_pc, exit + 1);
                match function.blocks.last_mut() {
                    Some(Block::Switch { exits }) => exits.push(exit),
                    _ => return Err(self.error("`case` closed outside of its `switch`")),
                }
            }
            Some(Block::With) => {
                self.emit(Instr::PopWith)?;
            }
            Some(Block::Collect(attr)) => {
                self.emit(Instr::EndCollect(attr))?;
            }
        }
        Ok(())
    }
}

/// Point the jump at `pc` to `to`. Only jump-carrying instructions are ever
/// patched.
fn patch(code: &mut [Instr], pc: usize, to: usize) {
    let to = u32::try_from(to).unwrap_or(u32::MAX);
    match code.get_mut(pc) {
        Some(
            Instr::Jump(target)
            | Instr::JumpIfNot { target, .. }
            | Instr::Case { target, .. }
            | Instr::IterNext { exit: target, .. },
        ) => *target = to,
        _ => {}
    }
}

#[cfg(test)]
mod tests;
