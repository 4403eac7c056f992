use ctxbench::bench::yielding;
use ctxbench::cli::{self, YieldCli};
use ctxbench::{app, logging};

fn main() {
    let cli: YieldCli = cli::parse();
    logging::init("timetctxsw2", &cli.bench.log);
    let cfg = app::build_yield_config(&cli);

    app::exit(app::execute(cli.bench.output.as_deref(), cfg.cpu, || {
        yielding::run(cfg.iterations, cfg.realtime)
    }))
}
