//! Writing a build cache entry and reading it back.
//!
//! Run with: cargo run --example cache_roundtrip

use cachegraph::{
    value, DecodeContext, Diagnostic, EncodeContext, LazyValue, ObjectMiddleware, Registry,
    Result, Serializable, Serialized, Value,
};
use std::error::Error;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Module {
    request: String,
    source: String,
    dependencies: Vec<Value>,
}

impl Serializable for Module {
    fn serialize(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        ctx.write(self.request.as_str())?;
        ctx.write(self.source.as_str())?;
        ctx.write(Value::sequence(self.dependencies.clone()))
    }

    fn deserialize(ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let request = ctx.read()?.expect_type()?;
        let source = ctx.read()?.expect_type()?;
        let dependencies = match ctx.read()?.as_sequence() {
            Some(sequence) => sequence.iter().cloned().collect(),
            None => Vec::new(),
        };
        Ok(Module {
            request,
            source,
            dependencies,
        })
    }
}

#[derive(Debug)]
struct FileWatcher;

impl PartialEq for FileWatcher {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let registry = Registry::new();
    registry.make_serializable::<Module>("demo/module", "Module")?;
    registry.register_not_serializable::<FileWatcher>()?;
    let middleware = ObjectMiddleware::new(Arc::new(registry));

    // Two modules sharing a dependency record
    let shared = value!({ "request": "./utils.js", "optional": false });
    let index = Value::object(Module {
        request: "./index.js".to_string(),
        source: "import './utils.js'".to_string(),
        dependencies: vec![shared.clone()],
    });
    let about = Value::object(Module {
        request: "./about.js".to_string(),
        source: "import './utils.js'".to_string(),
        dependencies: vec![shared],
    });
    let warning = Value::object(
        Diagnostic::new("ModuleWarning", "'./utils.js' has no default export")
            .with_details("imported by ./index.js"),
    );
    let stats = Value::Lazy(LazyValue::from_future(|| async {
        Ok(value!({ "modules": 2, "warnings": 1 }))
    }));

    let roots = vec![index, about, warning, stats];
    let tokens = match middleware.serialize(&roots)? {
        Serialized::Tokens(tokens) => tokens,
        Serialized::NotSerializable => return Err("cache entry is not serializable".into()),
    };
    println!("Serialized {} roots into {} tokens:", roots.len(), tokens.len());
    for token in &tokens {
        print!("{} ", token);
    }
    println!("\n");

    let back = middleware.deserialize(tokens)?;
    let first = back[0].downcast_ref::<Module>().ok_or("expected a module")?;
    let second = back[1].downcast_ref::<Module>().ok_or("expected a module")?;
    let shared_first = first.dependencies[0].as_object().ok_or("expected an object")?;
    let shared_second = second.dependencies[0].as_object().ok_or("expected an object")?;
    println!(
        "Shared dependency restored as one object: {}",
        shared_first.ptr_eq(shared_second)
    );

    if let Some(diagnostic) = back[2].downcast_ref::<Diagnostic>() {
        println!("Replayed diagnostic:\n{}\n", diagnostic.inspect());
    }

    if let Some(lazy) = back[3].as_lazy() {
        let stats = futures::executor::block_on(lazy.get().resolve())?;
        println!("Deferred stats, resolved on demand: {}", stats);
    }

    // A graph that holds a live watcher is skipped instead of cached
    let live = value!({ "watcher": (Value::object(FileWatcher)) });
    let skipped = middleware.serialize(&[live])?;
    println!("Graph with a file watcher skipped: {}", skipped.is_not_serializable());

    Ok(())
}
