use super::{exit_codes, open_context};
use crate::cli::args::{CatalogImportArgs, CatalogListArgs};
use querygate_core::catalog::load_catalog;

pub fn import(args: CatalogImportArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let objects = load_catalog(&args.file, &ctx.config.validator.default_schema)?;
    let n = ctx
        .store
        .replace_schema_objects(&args.data_source, &objects)?;
    tracing::info!(event = "catalog.imported", data_source_id = %args.data_source, objects = n);
    eprintln!("imported {} objects for data source {}", n, args.data_source);
    Ok(exit_codes::OK)
}

pub fn list(args: CatalogListArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    for o in ctx.store.list_schema_objects(&args.data_source)? {
        println!("{}.{}", o.schema_name, o.object_name);
    }
    Ok(exit_codes::OK)
}
