use schemagate_service::Catalog;

use crate::cmd::ServiceArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_schemas, OutputFormat};

pub fn run(service: &ServiceArgs, format: OutputFormat) -> CliResult<i32> {
    let config = service.resolver_config();
    let catalog = Catalog::new(
        &service.schemas_dir,
        &service.examples_dir,
        config.max_schema_file_size,
    );
    print_schemas(&catalog.list_schemas(), format);
    Ok(SUCCESS)
}
