//! Zone command handlers.

use tabled::Tabled;

use originscan_core::{OrgId, Zone};

use crate::cli::{ZonesArgs, ZonesCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Name Servers")]
    name_servers: String,
    #[tabled(rename = "Synced")]
    synced: String,
}

impl From<&Zone> for ZoneRow {
    fn from(z: &Zone) -> Self {
        Self {
            id: z.provider_id.clone(),
            name: z.name.clone(),
            status: z.status.clone(),
            name_servers: z.name_servers.join(", "),
            synced: util::timestamp(z.last_synced_at),
        }
    }
}

pub async fn handle(ctx: &Context, args: ZonesArgs) -> Result<(), CliError> {
    match args.command {
        ZonesCommand::List { org } => {
            let zones = ctx.service.zones(&OrgId::from(org.as_str())).await?;
            let out = output::render_list(
                ctx.output,
                &zones,
                |z| ZoneRow::from(z),
                |z| z.name.clone(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}
