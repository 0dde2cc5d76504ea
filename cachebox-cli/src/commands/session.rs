//! Scripted owner session.
//!
//! Starts one host against a catalog, runs the requested loads and
//! creations, then stops the owner and reports the ledger on both sides of
//! the teardown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cachebox::config::ConfigFile;
use cachebox::resource::Managed;
use cachebox::{
    BoxHost, BoxServices, CacheBox, Catalog, Category, ClassHandle, LazyReference, StreamableLoader,
    World,
};
use clap::Args;
use tracing::info;

use crate::error::CliError;

/// Arguments for `cachebox session`.
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Asset catalog (INI)
    #[arg(long, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Load an object synchronously
    #[arg(long = "load", value_name = "PATH")]
    pub load: Vec<String>,

    /// Load a class synchronously (checked against --base)
    #[arg(long = "load-class", value_name = "PATH")]
    pub load_class: Vec<String>,

    /// Base class for --load-class
    #[arg(long, value_name = "CLASS", default_value = "Object")]
    pub base: String,

    /// Load objects in the background as one batch
    #[arg(long = "async-load", value_name = "PATH")]
    pub async_load: Vec<String>,

    /// Create an instance of a class
    #[arg(long = "create", value_name = "CLASS")]
    pub create: Vec<String>,

    /// Owner name (defaults to [host] owner_name)
    #[arg(long)]
    pub owner: Option<String>,
}

/// Run a session.
pub fn run(args: SessionArgs, config: &ConfigFile) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    let store = Arc::new(Catalog::load(&args.catalog)?);
    let loader = Arc::new(StreamableLoader::new(
        store.clone(),
        config.loader_config(),
        runtime.handle().clone(),
    ));
    let world = Arc::new(World::new("SessionWorld"));
    let owner = args
        .owner
        .clone()
        .unwrap_or_else(|| config.owner_name.clone());

    let mut host = BoxHost::new(
        owner,
        BoxServices::new(store.clone(), loader.clone(), world.clone()),
    );
    host.on_owner_start();

    {
        let cache_box = host.cache_box()?;
        println!("{}", cache_box.identity());

        for path in &args.load {
            let handle = cache_box.load_object(&LazyReference::object(path.as_str()));
            report("load", path, handle.map(|h| h.id().to_string()));
        }

        if !args.load_class.is_empty() {
            let base = store
                .class(&args.base)
                .ok_or_else(|| CliError::UnknownClass(args.base.clone()))?;
            for path in &args.load_class {
                let handle = cache_box.load_class(&LazyReference::class(path.as_str()), &base);
                report("class", path, handle.and_then(|h| h.get()).map(|c| c.name().to_string()));
            }
        }

        if !args.async_load.is_empty() {
            let references: Vec<_> = args
                .async_load
                .iter()
                .map(|path| LazyReference::object(path.as_str()))
                .collect();
            let batches = Arc::new(AtomicUsize::new(0));
            let completed = Arc::clone(&batches);
            cache_box.request_async_load_objects(&references, move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
            runtime.block_on(loader.flush());
            for reference in &references {
                report(
                    "async",
                    reference.path().as_str(),
                    reference.resolved_id().map(|id| id.to_string()),
                );
            }
            info!(batches = batches.load(Ordering::SeqCst), "Async loads delivered");
        }

        for name in &args.create {
            let class = store
                .class(name)
                .ok_or_else(|| CliError::UnknownClass(name.clone()))?;
            let handle = create(cache_box, &class);
            report("create", name, handle);
        }

        println!("ledger before stop: {}", cache_box.stats());
        cache_box.teardown();
        println!("ledger after stop:  {}", cache_box.stats());
    }

    host.on_owner_stop();
    println!(
        "world: {} entities, {} attached elements",
        world.entity_count(),
        world.attached_count()
    );
    Ok(())
}

fn create(cache_box: &CacheBox, class: &ClassHandle) -> Option<String> {
    let handle = match class.category() {
        Category::DisplayElement => cache_box.create_display_element(class),
        Category::SpawnedEntity => cache_box.create_spawned_entity(class),
        Category::Object | Category::ParameterSet => cache_box.create_resource(class),
    };
    handle.map(|h| h.id().to_string())
}

fn report(action: &str, subject: &str, outcome: Option<String>) {
    match outcome {
        Some(detail) => println!("{:<7} {} -> {}", action, subject, detail),
        None => println!("{:<7} {} -> failed", action, subject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_session_runs_against_catalog() {
        let mut catalog = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        catalog
            .write_all(
                b"[class:Object]\ncategory = object\n\n\
                  [class:Actor]\ncategory = entity\n\n\
                  [asset:/Game/Data/Settings]\nclass = Object\n",
            )
            .unwrap();

        let args = SessionArgs {
            catalog: catalog.path().to_path_buf(),
            load: vec!["/Game/Data/Settings".to_string(), "/Game/Foo".to_string()],
            load_class: Vec::new(),
            base: "Object".to_string(),
            async_load: vec!["/Game/Data/Settings".to_string()],
            create: vec!["Actor".to_string(), "Object".to_string()],
            owner: Some("TestOwner".to_string()),
        };
        assert!(run(args, &ConfigFile::default()).is_ok());
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        let mut catalog = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        catalog.write_all(b"[class:Object]\ncategory = object\n").unwrap();

        let args = SessionArgs {
            catalog: catalog.path().to_path_buf(),
            load: Vec::new(),
            load_class: Vec::new(),
            base: "Object".to_string(),
            async_load: Vec::new(),
            create: vec!["Missing".to_string()],
            owner: None,
        };
        assert!(matches!(
            run(args, &ConfigFile::default()),
            Err(CliError::UnknownClass(_))
        ));
    }
}
