use std::env;
use std::fs;
use std::process;

fn main() {
  let args: Vec<String> = env::args().collect();

  match args.len() {
    // No arguments: run the built-in check suite.
    1 => {
      if let Err(err) = nanoc::selftest::run() {
        eprintln!("{err}");
        process::exit(1);
      }
      println!("self-test suite completed");
    }
    // One argument: compile the file to stdout.
    2 => {
      let source = match fs::read_to_string(&args[1]) {
        Ok(source) => source,
        Err(err) => {
          eprintln!("{}: {err}", args[1]);
          process::exit(1);
        }
      };
      match nanoc::generate_assembly(&source) {
        Ok(asm) => print!("{asm}"),
        Err(err) => {
          eprintln!("{err}");
          process::exit(1);
        }
      }
    }
    _ => {
      let program = args.first().map(String::as_str).unwrap_or("nanoc");
      eprintln!("usage: {program} [source-file]");
      process::exit(1);
    }
  }
}
