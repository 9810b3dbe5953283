use clap::Parser;
use brokerdesk::cli::{
    run_config, run_customer_add, run_customer_list, run_customer_show, run_family, run_import,
    run_policy, run_quote, Cli, Commands, CustomerCommand,
};
use brokerdesk::db::Database;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Customer(CustomerCommand::Add(args)) => {
            run_customer_add(&db, args)?;
        }
        Commands::Customer(CustomerCommand::List(args)) => {
            run_customer_list(&db, args)?;
        }
        Commands::Customer(CustomerCommand::Show(args)) => {
            run_customer_show(&db, &args.identifier)?;
        }
        Commands::Customer(CustomerCommand::Import(args)) => {
            run_import(&db, &args.file, args.dry_run)?;
        }
        Commands::Family(command) => run_family(&db, command)?,
        Commands::Quote(command) => run_quote(&db, command)?,
        Commands::Policy(command) => run_policy(&db, command)?,
        Commands::Config(command) => run_config(&db, command)?,
    }

    Ok(())
}
