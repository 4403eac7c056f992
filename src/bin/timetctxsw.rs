use ctxbench::bench::switch;
use ctxbench::cli::{self, SwitchCli};
use ctxbench::{app, logging};

fn main() {
    let cli: SwitchCli = cli::parse();
    logging::init("timetctxsw", &cli.bench.log);
    let cfg = app::build_switch_config(&cli);

    app::exit(app::execute(cli.bench.output.as_deref(), cfg.cpu, || {
        switch::run(cfg.iterations, cfg.peer, cfg.primitive)
    }))
}
