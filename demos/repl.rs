use minilisp::builtinops::get_builtin_ops;
use minilisp::environment::Environment;
use minilisp::{Interpreter, InterpreterConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Install a log subscriber, only when RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}

fn run_repl() {
    println!("MiniLisp Interpreter");
    println!("Enter expressions like: (print (+ 1 2))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };
    let mut interp = Interpreter::with_config(InterpreterConfig::default().with_comments(true));

    // Input is collected across lines until its parentheses close
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "minilisp> " } else { "     ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if pending.is_empty() {
                    if line.is_empty() {
                        continue;
                    }
                    match line {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interp.environment());
                            continue;
                        }
                        ":reset" => {
                            interp.reset();
                            println!("Environment cleared.");
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(line);
                pending.push('\n');
                if open_paren_balance(&pending) > 0 {
                    continue;
                }

                let source = std::mem::take(&mut pending);
                let _ = rl.add_history_entry(source.trim());

                let execution = interp.execute(&source);
                let ok_value = execution.outcome.as_ref().ok().cloned();
                let printed_anything = !execution.output.is_empty();
                for line in execution.into_lines() {
                    println!("{line}");
                }
                // Echo the final value when nothing was printed
                if let Some(value) = ok_value
                    && !printed_anything
                {
                    println!("=> {value}");
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
                println!("(input discarded)");
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Unclosed '(' count, ignoring `;` comments
fn open_paren_balance(source: &str) -> i64 {
    source
        .lines()
        .flat_map(|line| line.split(';').next().unwrap_or_default().chars())
        .map(|c| match c {
            '(' => 1,
            ')' => -1,
            _ => 0,
        })
        .sum()
}

fn print_help() {
    println!("MiniLisp Interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current variables and functions");
    println!("  :reset     - Discard all variables and functions");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter (or discard unfinished input)");
    println!();
    let operators: Vec<&str> = get_builtin_ops().iter().map(|op| op.id).collect();
    println!("Built-in operators: {}", operators.join(" "));
    println!();
    println!("Language:");
    println!("  Numbers: 42, -5            Text: any other word, e.g. hello");
    println!("  Arithmetic: + - * / ^ %    Comparison: > < = >= <=");
    println!("  Variables: (setq x 5)      Output: (print x)");
    println!("  Conditionals: (if cond then else)");
    println!("  Loops: (while cond body...), (for init cond body update)");
    println!("  Functions: (defun name (params...) body...)");
    println!("  Comments: ; to end of line");
    println!();
    println!("Examples:");
    println!("  (print (+ 1 2 3))");
    println!("  (defun sq (x) (* x x)) (print (sq 4))");
    println!("  (setq i 0) (while (< i 3) (print i) (setq i (+ i 1)))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();
    let functions = env.function_names();

    if bindings.is_empty() && functions.is_empty() {
        println!("Environment is empty.");
        return;
    }

    if !functions.is_empty() {
        println!("Functions ({}):", functions.len());
        for name in functions {
            if let Some(function) = env.get_function(name) {
                println!("  ({name} {})", function.parameters.join(" "));
            }
        }
        println!();
    }

    if !bindings.is_empty() {
        println!("Variables ({}):", bindings.len());
        for (name, value) in bindings {
            println!("  {name} = {value}");
        }
    }
}
