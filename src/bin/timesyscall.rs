use ctxbench::bench::trap::{self, Gettid};
use ctxbench::cli::{self, SyscallCli};
use ctxbench::{app, logging};

fn main() {
    let cli: SyscallCli = cli::parse();
    logging::init("timesyscall", &cli.bench.log);
    let cfg = app::build_trap_config(&cli.bench);

    app::exit(app::execute(cli.bench.output.as_deref(), cfg.cpu, || {
        trap::run(cfg.iterations, &Gettid)
    }))
}
