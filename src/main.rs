use clap::{arg,crate_version,value_parser,ArgMatches,Command};
use rand::Rng;
use bytecoders::{lz77,huffman,Coder,EncodedMessage};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        std::io::stdin().read_line(&mut ans).expect("could not read stdin");
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            log::warn!("existing file will not be truncated");
            return true;
        }
        return false;
    }
    true
}

/// LZ77 options with any limits given on the command line
fn lz77_options(cmd: &ArgMatches) -> lz77::Options {
    let mut opt = lz77::STD_OPTIONS;
    if let Some(window) = cmd.get_one::<usize>("window") {
        opt.window = *window;
    }
    if let Some(lookahead) = cmd.get_one::<usize>("lookahead") {
        opt.lookahead = *lookahead;
    }
    opt
}

/// run `f`, returning its result and the elapsed seconds
fn timed<T,F: FnOnce() -> T>(f: F) -> (T,f64) {
    let now = std::time::Instant::now();
    let ans = f();
    (ans,now.elapsed().as_secs_f64())
}

/// unstructured data of the given length, symbols drawn uniformly from 0..128
fn random_symbols(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random_range(0..128)).collect()
}

/// LZ77 limits tried by `stats --sweep`
const SWEEP: [(usize,usize);6] = [(255,15),(255,255),(4095,15),(4095,255),(65535,15),(65535,255)];

fn print_stats<C: Coder>(name: &str,coder: &C,bytes: &[u8]) -> STDRESULT {
    let (message,encode_secs) = timed(|| coder.encode(bytes));
    let (decoded,decode_secs) = timed(|| coder.decode(&message));
    if decoded? != bytes {
        return Err(format!("{} did not reproduce the input",name).into());
    }
    println!("  {:8} {:>10} => {:>10}   encode {:.6}s   decode {:.6}s   ratio {:.3}",
        name,bytes.len(),message.size(),encode_secs,decode_secs,
        bytecoders::compression_ratio(bytes.len(),message.size()));
    Ok(())
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `bytecoders compress -m lz77 -i my_expanded -o my_compressed`
Expand:        `bytecoders expand -m lz77 -i my_compressed -o my_expanded`
Measure:       `bytecoders stats --baseline --sweep bible.txt fields.c`";

    let methods = ["lz77","huffman"];

    let mut main_cmd = Command::new("bytecoders")
        .about("Compress and expand with LZ77 or Huffman coding")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--window <SIZE> "LZ77 search window").value_parser(value_parser!(usize)).required(false))
        .arg(arg!(--lookahead <SIZE> "LZ77 maximum match length").value_parser(value_parser!(usize)).required(false))
        .arg(arg!(-p --"print-triples" "print LZ77 triples to stdout"))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--window <SIZE> "LZ77 search window").value_parser(value_parser!(usize)).required(false))
        .arg(arg!(--lookahead <SIZE> "LZ77 maximum match length").value_parser(value_parser!(usize)).required(false))
        .about("expand a file"));

    main_cmd = main_cmd.subcommand(Command::new("stats")
        .arg(arg!(<PATH> ... "files to measure"))
        .arg(arg!(--window <SIZE> "LZ77 search window").value_parser(value_parser!(usize)).required(false))
        .arg(arg!(--lookahead <SIZE> "LZ77 maximum match length").value_parser(value_parser!(usize)).required(false))
        .arg(arg!(--baseline "also measure random data of the same length"))
        .arg(arg!(--sweep "measure LZ77 over a range of window and lookahead sizes"))
        .about("print timing and compression ratio of each method"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = match method.as_str() {
            "lz77" => lz77::compress(&mut in_file,&mut out_file,&lz77_options(cmd))?,
            "huffman" => huffman::compress(&mut in_file,&mut out_file,&huffman::STD_OPTIONS)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        out_file.set_len(out_size)?;
        if method=="lz77" && cmd.get_flag("print-triples") {
            let message = lz77::Lz77Message::from_bytes(&std::fs::read(path_out)?)?;
            for t in message.triples() {
                println!("{}",t);
            }
        }
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = match method.as_str() {
            "lz77" => lz77::expand(&mut in_file,&mut out_file,&lz77_options(cmd))?,
            "huffman" => huffman::expand(&mut in_file,&mut out_file,&huffman::STD_OPTIONS)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("stats") {
        let lz = lz77::Lz77::create(&lz77_options(cmd))?;
        for path in cmd.get_many::<String>("PATH").expect(RCH) {
            let bytes = std::fs::read(path)?;
            println!("{} ({} bytes)",path,bytes.len());
            print_stats("lz77",&lz,&bytes)?;
            print_stats("huffman",&huffman::Huffman,&bytes)?;
            if cmd.get_flag("sweep") {
                for (window,lookahead) in SWEEP {
                    let coder = lz77::Lz77::new(window,lookahead)?;
                    print_stats(&format!("lz77 w={} l={}",window,lookahead),&coder,&bytes)?;
                }
            }
            if cmd.get_flag("baseline") {
                let random = random_symbols(bytes.len());
                println!("random baseline ({} bytes)",random.len());
                print_stats("lz77",&lz,&random)?;
                print_stats("huffman",&huffman::Huffman,&random)?;
            }
        }
    }

    Ok(())
}
