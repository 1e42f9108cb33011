//! Builders for small Extism guest modules.
//!
//! Guests are assembled directly with `wasm-encoder`, so tests need no WASM
//! toolchain. Each guest exports one `() -> i32` function that runs a list
//! of steps against the Extism kernel (`alloc`, `store_u8`, `length`,
//! `output_set`) and the runtime's host functions.

use std::path::{Path, PathBuf};

use caduceus_sandbox::host::{EXTISM_KERNEL_MODULE, HOST_LOG_FN, HOST_SECRET_FN, HOST_USER_MODULE};
use serde_json::Value;
use wasm_encoder::{
    BlockType, CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection,
    ImportSection, Instruction, Module, TypeSection, ValType,
};

// Type indices.
const TY_ENTRY: u32 = 0; // () -> i32
const TY_I64_I64: u32 = 1; // (i64) -> i64
const TY_STORE_U8: u32 = 2; // (i64, i32) -> ()
const TY_I64_PAIR: u32 = 3; // (i64, i64) -> ()
const TY_UNIT: u32 = 4; // () -> ()

// Function indices of the fixed imports.
const FN_ALLOC: u32 = 0;
const FN_STORE_U8: u32 = 1;
const FN_LENGTH: u32 = 2;
const FN_OUTPUT_SET: u32 = 3;
const FN_LOG: u32 = 4;
const FN_SECRET: u32 = 5;
const FIXED_IMPORTS: u32 = 6;

// Locals of the entry function.
const LOCAL_A: u32 = 0;
const LOCAL_B: u32 = 1;

#[derive(Debug, Clone)]
enum Step {
    Log { level: String, message: String },
    Output(Vec<u8>),
    OutputSecret(String),
    Trap,
    Spin,
}

/// A guest module under construction.
#[derive(Debug, Clone)]
pub struct GuestModule {
    export: String,
    extra_imports: Vec<(String, String)>,
    steps: Vec<Step>,
    return_code: i32,
}

impl Default for GuestModule {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestModule {
    /// A guest exporting `compute` that does nothing and returns 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            export: "compute".to_string(),
            extra_imports: Vec::new(),
            steps: Vec::new(),
            return_code: 0,
        }
    }

    /// Rename the exported function.
    #[must_use]
    pub fn with_export(mut self, name: &str) -> Self {
        self.export = name.to_string();
        self
    }

    /// Name of the exported function.
    #[must_use]
    pub fn export_name(&self) -> &str {
        &self.export
    }

    /// Import an extra `() -> ()` function that is never called.
    #[must_use]
    pub fn with_import(mut self, module: &str, name: &str) -> Self {
        self.extra_imports.push((module.to_string(), name.to_string()));
        self
    }

    /// Call `caduceus_log(level, message)`.
    #[must_use]
    pub fn log(mut self, level: &str, message: &str) -> Self {
        self.steps.push(Step::Log {
            level: level.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Set the output to `bytes`.
    #[must_use]
    pub fn output(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Output(bytes.into()));
        self
    }

    /// Set the output to the JSON text of `value`.
    #[must_use]
    pub fn output_json(self, value: &Value) -> Self {
        self.output(value.to_string())
    }

    /// Set the output to the value of secret `name`.
    #[must_use]
    pub fn output_secret(mut self, name: &str) -> Self {
        self.steps.push(Step::OutputSecret(name.to_string()));
        self
    }

    /// Trap with `unreachable`.
    #[must_use]
    pub fn trap(mut self) -> Self {
        self.steps.push(Step::Trap);
        self
    }

    /// Loop forever.
    #[must_use]
    pub fn spin(mut self) -> Self {
        self.steps.push(Step::Spin);
        self
    }

    /// Return `code` from the export. Non-zero signals failure.
    #[must_use]
    pub fn returning(mut self, code: i32) -> Self {
        self.return_code = code;
        self
    }

    /// Encode the module.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        types.ty().function([], [ValType::I32]);
        types.ty().function([ValType::I64], [ValType::I64]);
        types.ty().function([ValType::I64, ValType::I32], []);
        types.ty().function([ValType::I64, ValType::I64], []);
        types.ty().function([], []);
        module.section(&types);

        let mut imports = ImportSection::new();
        imports.import(EXTISM_KERNEL_MODULE, "alloc", EntityType::Function(TY_I64_I64));
        imports.import(EXTISM_KERNEL_MODULE, "store_u8", EntityType::Function(TY_STORE_U8));
        imports.import(EXTISM_KERNEL_MODULE, "length", EntityType::Function(TY_I64_I64));
        imports.import(EXTISM_KERNEL_MODULE, "output_set", EntityType::Function(TY_I64_PAIR));
        imports.import(HOST_USER_MODULE, HOST_LOG_FN, EntityType::Function(TY_I64_PAIR));
        imports.import(HOST_USER_MODULE, HOST_SECRET_FN, EntityType::Function(TY_I64_I64));
        for (m, n) in &self.extra_imports {
            imports.import(m, n, EntityType::Function(TY_UNIT));
        }
        module.section(&imports);

        let mut funcs = FunctionSection::new();
        funcs.function(TY_ENTRY);
        module.section(&funcs);

        let entry_index = u32::try_from(self.extra_imports.len())
            .ok()
            .and_then(|n| n.checked_add(FIXED_IMPORTS))
            .unwrap_or(u32::MAX);
        let mut exports = ExportSection::new();
        exports.export(&self.export, ExportKind::Func, entry_index);
        module.section(&exports);

        let mut f = Function::new([(2, ValType::I64)]);
        for step in &self.steps {
            emit_step(&mut f, step);
        }
        f.instruction(&Instruction::I32Const(self.return_code));
        f.instruction(&Instruction::End);

        let mut code = CodeSection::new();
        code.function(&f);
        module.section(&code);

        module.finish()
    }

    /// Encode the module and write it to `dir/file_name`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create module directory");
        }
        std::fs::write(&path, self.build()).expect("failed to write module");
        path
    }
}

/// A guest that outputs `effects` as a JSON array.
#[must_use]
pub fn effects_output(effects: &[Value]) -> GuestModule {
    GuestModule::new().output_json(&Value::Array(effects.to_vec()))
}

/// Allocate a kernel block holding `bytes` and keep its offset in `local`.
fn emit_block(f: &mut Function, bytes: &[u8], local: u32) {
    f.instruction(&Instruction::I64Const(as_i64(bytes.len())));
    f.instruction(&Instruction::Call(FN_ALLOC));
    f.instruction(&Instruction::LocalSet(local));
    for (i, byte) in bytes.iter().enumerate() {
        f.instruction(&Instruction::LocalGet(local));
        f.instruction(&Instruction::I64Const(as_i64(i)));
        f.instruction(&Instruction::I64Add);
        f.instruction(&Instruction::I32Const(i32::from(*byte)));
        f.instruction(&Instruction::Call(FN_STORE_U8));
    }
}

fn emit_step(f: &mut Function, step: &Step) {
    match step {
        Step::Log { level, message } => {
            emit_block(f, level.as_bytes(), LOCAL_A);
            emit_block(f, message.as_bytes(), LOCAL_B);
            f.instruction(&Instruction::LocalGet(LOCAL_A));
            f.instruction(&Instruction::LocalGet(LOCAL_B));
            f.instruction(&Instruction::Call(FN_LOG));
        },
        Step::Output(bytes) => {
            if bytes.is_empty() {
                return;
            }
            emit_block(f, bytes, LOCAL_A);
            f.instruction(&Instruction::LocalGet(LOCAL_A));
            f.instruction(&Instruction::I64Const(as_i64(bytes.len())));
            f.instruction(&Instruction::Call(FN_OUTPUT_SET));
        },
        Step::OutputSecret(name) => {
            emit_block(f, name.as_bytes(), LOCAL_A);
            f.instruction(&Instruction::LocalGet(LOCAL_A));
            f.instruction(&Instruction::Call(FN_SECRET));
            f.instruction(&Instruction::LocalSet(LOCAL_B));
            f.instruction(&Instruction::LocalGet(LOCAL_B));
            f.instruction(&Instruction::LocalGet(LOCAL_B));
            f.instruction(&Instruction::Call(FN_LENGTH));
            f.instruction(&Instruction::Call(FN_OUTPUT_SET));
        },
        Step::Trap => {
            f.instruction(&Instruction::Unreachable);
        },
        Step::Spin => {
            f.instruction(&Instruction::Loop(BlockType::Empty));
            f.instruction(&Instruction::Br(0));
            f.instruction(&Instruction::End);
        },
    }
}

fn as_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
