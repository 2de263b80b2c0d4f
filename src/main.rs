use clap::Parser;
use sfs::cli_interface::SfsCli;
/// a CLI interface to users to create an sfs image,
/// and to inspect or change one without mounting it.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = SfsCli::parse();
    sfs::cli_interface::run(args, &mut std::io::stdout().lock())
}
