//! Shared fixtures for integration tests
//!
//! Provides the "Sample" host module, helpers that lay its artifacts out on
//! disk, and a fully wired catalog + engine.

#![allow(dead_code)]

use anyhow::anyhow;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use modcat::config::{EngineConfig, ScannerConfig};
use modcat::module::metadata::{MemberFlags, MemberRecord, ModuleRecord, ParameterRecord, TypeFlags, TypeRecord};
use modcat::module::{ArtifactManifest, Catalog, Engine, HostModules, ModuleHandle, Scanner, TypeHandle, Value};

pub const SAMPLE_ID: &str = "Sample";
pub const SAMPLE_VERSION: &str = "1.0.0";

/// Instance state behind `Sample.Widget`
pub struct Widget {
    pub width: i64,
    pub height: i64,
}

/// Instance state behind `Sample.Counter`
#[derive(Default)]
pub struct Counter {
    value: AtomicI64,
}

fn string_arg(args: &[Value], index: usize) -> anyhow::Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("argument {} must be a string", index))
}

fn int_arg(args: &[Value], index: usize) -> anyhow::Result<i64> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| anyhow!("argument {} must be an int", index))
}

fn counter(instance: &modcat::module::Instance) -> anyhow::Result<&Counter> {
    instance
        .downcast_ref::<Counter>()
        .ok_or_else(|| anyhow!("{} is not a counter", instance.type_name()))
}

/// The "Sample" module as the host process registers it
pub fn sample_module() -> ModuleHandle {
    let greeter = TypeHandle::builder("Sample", "Greeter")
        .static_type()
        .static_method("Greet", &[("name", "string")], "string", |args| {
            Ok(Value::from(format!("Hello, {}!", string_arg(args, 0)?)))
        })
        .static_method(
            "Greet",
            &[("name", "string"), ("punctuation", "string")],
            "string",
            |args| {
                Ok(Value::from(format!(
                    "Hello, {}{}",
                    string_arg(args, 0)?,
                    string_arg(args, 1)?
                )))
            },
        )
        .static_method("Fail", &[], "void", |_| Err(anyhow!("greeter is out of words")))
        .static_method("Explode", &[], "void", |_| panic!("greeter exploded"))
        .async_static_method("FetchAsync", &[("name", "string")], "Future<string>", |args| {
            async move { Ok(Value::from(format!("Fetched {}", string_arg(&args, 0)?))) }.boxed()
        })
        .async_static_method("WaitForever", &[], "Task<string>", |_| {
            futures::future::pending::<anyhow::Result<Value>>().boxed()
        })
        .build();

    let widget = TypeHandle::builder("Sample", "Widget")
        .constructor(&[("width", "int"), ("height", "int")], |args| {
            Ok(Widget {
                width: int_arg(args, 0)?,
                height: int_arg(args, 1)?,
            })
        })
        .method("Area", &[], "int", |instance, _| {
            let widget = instance
                .downcast_ref::<Widget>()
                .ok_or_else(|| anyhow!("not a widget"))?;
            Ok(Value::from(widget.width * widget.height))
        })
        .build();

    let counter_type = TypeHandle::builder("Sample", "Counter")
        .constructor(&[], |_| Ok(Counter::default()))
        .constructor(&[("start", "int")], |args| {
            Ok(Counter {
                value: AtomicI64::new(int_arg(args, 0)?),
            })
        })
        .method("Increment", &[("by", "int")], "int", |instance, args| {
            let by = int_arg(args, 0)?;
            Ok(Value::from(counter(instance)?.value.fetch_add(by, Ordering::SeqCst) + by))
        })
        .async_method("GetAsync", &[], "Task<int>", |instance, _| {
            async move { Ok(Value::from(counter(&instance)?.value.load(Ordering::SeqCst))) }.boxed()
        })
        .build();

    // Two constructors accept a single string
    let label = TypeHandle::builder("Sample", "Label")
        .constructor(&[("text", "string")], |args| string_arg(args, 0))
        .constructor(&[("value", "object")], |args| {
            Ok(format!("{:?}", args.first().cloned().unwrap_or_default()))
        })
        .build();

    ModuleHandle::builder(SAMPLE_ID)
        .with_type(greeter)
        .with_type(widget)
        .with_type(counter_type)
        .with_type(label)
        .build()
}

/// A module exposing `Ping() -> string` that answers with its own name
pub fn ping_module(name: &str) -> ModuleHandle {
    let answer = name.to_string();
    ModuleHandle::builder(name)
        .with_type(
            TypeHandle::builder(name, "Api")
                .static_method("Ping", &[], "string", move |_| Ok(Value::from(answer.clone())))
                .build(),
        )
        .build()
}

/// Write `manifest` to `<package>/lib/<target>/<stem>.artifact.toml`
pub fn write_artifact(package: &Path, target: &str, stem: &str, manifest: &ArtifactManifest) -> PathBuf {
    let path = package
        .join("lib")
        .join(target)
        .join(format!("{}.artifact.toml", stem));
    write_file(&path, &manifest.to_toml_string().unwrap());
    path
}

/// Write raw text, creating parent directories
pub fn write_file(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Lay out the Sample module as a package under `root`
pub fn write_sample_layout(root: &Path) {
    write_artifact(root, "host1.0", "Sample", &sample_module().describe());
}

/// Scanned, cataloged and registered Sample module
pub struct SampleFixture {
    pub dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub hosts: Arc<HostModules>,
    pub engine: Engine,
}

impl SampleFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        write_sample_layout(dir.path());

        let record = Scanner::new(&ScannerConfig::default())
            .scan(dir.path(), SAMPLE_ID, SAMPLE_VERSION)
            .unwrap();
        let catalog = Arc::new(Catalog::new());
        catalog.add_or_update(record).unwrap();

        let hosts = Arc::new(HostModules::new());
        hosts.register(sample_module());

        let engine = Engine::new(Arc::clone(&catalog), Arc::clone(&hosts), EngineConfig::default());
        Self {
            dir,
            catalog,
            hosts,
            engine,
        }
    }
}

/// Record with one static type `<id>.Api` and the given zero-arg members
pub fn simple_record(id: &str, version: &str, members: &[&str]) -> ModuleRecord {
    let mut record = ModuleRecord::new(id, version, format!("/modules/{}", id));
    record
        .types
        .push(TypeRecord::new(id, "Api", TypeFlags::default(), id));
    for name in members {
        record.members.push(MemberRecord {
            owner_type: format!("{}.Api", id),
            name: name.to_string(),
            return_type: "string".to_string(),
            parameters: Vec::new(),
            flags: MemberFlags {
                is_static: true,
                is_public: true,
                is_async: false,
            },
            module_id: id.to_string(),
        });
    }
    record
}

/// Same as `simple_record` with one string parameter per member
pub fn unary_record(id: &str, version: &str, members: &[&str]) -> ModuleRecord {
    let mut record = simple_record(id, version, members);
    for member in &mut record.members {
        member.parameters.push(ParameterRecord::required("value", "string"));
    }
    record
}
