use std::{collections::HashSet, fs::File, io::Read, path::Path};

use crate::blif::{BlifError, Result};
use crate::design::State;

/// One statement of a BLIF model body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlifItem {
    /// `.names in1 .. inK out` and its cover, each row being the input cube and the
    /// output value (`'0'` or `'1'`). A constant driver has no inputs.
    Names {
        inputs: Vec<String>,
        output: String,
        cover: Vec<(String, char)>,
    },
    /// `.gate` or `.subckt` with its `pin=net` pairs, in file order.
    Gate {
        kind: String,
        pins: Vec<(String, String)>,
    },
    /// `.latch in out [type ctrl] [init]`.
    Latch {
        input: String,
        output: String,
        init: State,
    },
    /// `.conn lhs rhs`: `lhs` is driven by `rhs`.
    Conn { lhs: String, rhs: String },
}

/// A `.model` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlifModel {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub items: Vec<BlifItem>,
}

impl BlifModel {
    /// Every net name of the model, in order of first appearance.
    pub fn nets(&self) -> Vec<&str> {
        let mut all: Vec<&str> = Vec::new();
        all.extend(self.inputs.iter().map(String::as_str));
        all.extend(self.outputs.iter().map(String::as_str));
        for item in &self.items {
            match item {
                BlifItem::Names { inputs, output, .. } => {
                    all.extend(inputs.iter().map(String::as_str));
                    all.push(output);
                }
                BlifItem::Gate { pins, .. } => {
                    all.extend(pins.iter().map(|(_, net)| net.as_str()));
                }
                BlifItem::Latch { input, output, .. } => {
                    all.push(input);
                    all.push(output);
                }
                BlifItem::Conn { lhs, rhs } => {
                    all.push(lhs);
                    all.push(rhs);
                }
            }
        }
        let mut seen = HashSet::new();
        all.retain(|net| seen.insert(*net));
        all
    }
}

/// All the models of a BLIF file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlifNetlist {
    pub models: Vec<BlifModel>,
}

impl BlifNetlist {
    /// The model named `name`, or a [`BlifError::MissingModel`].
    pub fn model(&self, name: &str) -> Result<&BlifModel> {
        self.models
            .iter()
            .find(|model| model.name == name)
            .ok_or_else(|| BlifError::MissingModel(name.to_string()))
    }
}

/// A logical line: continuation lines joined, comment stripped.
struct Line {
    number: usize,
    tokens: Vec<String>,
}

fn logical_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut start = 0;

    for (k, raw) in text.lines().enumerate() {
        let raw = raw.split('#').next().unwrap_or_default();
        if pending.is_empty() {
            start = k + 1;
        }
        match raw.trim_end().strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head);
                pending.push(' ');
            }
            None => {
                pending.push_str(raw);
                let tokens: Vec<String> =
                    pending.split_whitespace().map(str::to_string).collect();
                if !tokens.is_empty() {
                    lines.push(Line {
                        number: start,
                        tokens,
                    });
                }
                pending.clear();
            }
        }
    }

    let tokens: Vec<String> = pending.split_whitespace().map(str::to_string).collect();
    if !tokens.is_empty() {
        lines.push(Line {
            number: start,
            tokens,
        });
    }
    lines
}

fn read_init(line: usize, token: &str) -> Result<State> {
    match token {
        "0" => Ok(State::S0),
        "1" => Ok(State::S1),
        "2" | "3" => Ok(State::Sx),
        _ => Err(BlifError::InvalidToken(
            line,
            "expected latch init 0, 1, 2 or 3, got ".to_string() + token,
        )),
    }
}

fn read_latch(line: &Line) -> Result<BlifItem> {
    let args = &line.tokens[1..];
    let init = match args.len() {
        2 | 4 => State::Sx,
        3 => read_init(line.number, &args[2])?,
        5 => read_init(line.number, &args[4])?,
        _ => {
            return Err(BlifError::InvalidToken(
                line.number,
                "expected 2 to 5 latch tokens".to_string(),
            ));
        }
    };
    Ok(BlifItem::Latch {
        input: args[0].clone(),
        output: args[1].clone(),
        init,
    })
}

fn read_gate(line: &Line) -> Result<BlifItem> {
    let Some(kind) = line.tokens.get(1) else {
        return Err(BlifError::InvalidToken(
            line.number,
            "expected a gate type".to_string(),
        ));
    };
    let pins = line.tokens[2..]
        .iter()
        .map(|pin| {
            pin.split_once('=')
                .map(|(pin, net)| (pin.to_string(), net.to_string()))
                .ok_or_else(|| {
                    BlifError::InvalidToken(line.number, "expected pin=net, got ".to_string() + pin)
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BlifItem::Gate {
        kind: kind.clone(),
        pins,
    })
}

fn read_cover_row(line: &Line, inputs: usize) -> Result<(String, char)> {
    let (cube, value) = match (inputs, line.tokens.as_slice()) {
        (0, [value]) => (String::new(), value),
        (_, [cube, value]) if cube.len() == inputs => (cube.clone(), value),
        _ => {
            return Err(BlifError::InvalidToken(
                line.number,
                format!("expected a cover row over {} inputs", inputs),
            ));
        }
    };
    if !cube.chars().all(|c| matches!(c, '0' | '1' | '-')) {
        return Err(BlifError::InvalidToken(
            line.number,
            "invalid cube ".to_string() + &cube,
        ));
    }
    match value.as_str() {
        "0" => Ok((cube, '0')),
        "1" => Ok((cube, '1')),
        _ => Err(BlifError::InvalidToken(
            line.number,
            "expected output value 0 or 1, got ".to_string() + value,
        )),
    }
}

/// Parses BLIF text.
///
/// ```rust
/// use blifmap::blif::{BlifItem, parse_netlist};
/// let netlist = parse_netlist(
///     ".model netlist\n.inputs a b\n.outputs y\n.gate AND A=a B=b Y=y\n.end\n",
/// )
/// .unwrap();
/// let model = netlist.model("netlist").unwrap();
/// assert_eq!(model.nets(), vec!["a", "b", "y"]);
/// assert!(matches!(&model.items[0], BlifItem::Gate { kind, .. } if kind == "AND"));
/// ```
pub fn parse_netlist(text: &str) -> Result<BlifNetlist> {
    let mut netlist = BlifNetlist::default();
    let mut model: Option<BlifModel> = None;

    for line in logical_lines(text) {
        let directive = line.tokens[0].as_str();

        if directive == ".model" {
            if let Some(done) = model.take() {
                netlist.models.push(done);
            }
            model = Some(BlifModel {
                name: line.tokens.get(1).cloned().unwrap_or_default(),
                ..Default::default()
            });
            continue;
        }

        let Some(current) = model.as_mut() else {
            return Err(BlifError::InvalidToken(
                line.number,
                "expected .model, got ".to_string() + directive,
            ));
        };

        match directive {
            ".inputs" => current.inputs.extend(line.tokens[1..].iter().cloned()),
            ".outputs" => current.outputs.extend(line.tokens[1..].iter().cloned()),
            ".names" => {
                let Some((output, inputs)) = line.tokens[1..].split_last() else {
                    return Err(BlifError::InvalidToken(
                        line.number,
                        "expected .names output".to_string(),
                    ));
                };
                current.items.push(BlifItem::Names {
                    inputs: inputs.to_vec(),
                    output: output.clone(),
                    cover: Vec::new(),
                });
            }
            ".gate" | ".subckt" => current.items.push(read_gate(&line)?),
            ".latch" => current.items.push(read_latch(&line)?),
            ".conn" => match &line.tokens[1..] {
                [lhs, rhs] => current.items.push(BlifItem::Conn {
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                }),
                _ => {
                    return Err(BlifError::InvalidToken(
                        line.number,
                        "expected .conn lhs rhs".to_string(),
                    ));
                }
            },
            ".end" => {
                if let Some(done) = model.take() {
                    netlist.models.push(done);
                }
            }
            _ if directive.starts_with('.') => {
                return Err(BlifError::UnsupportedFeature(
                    line.number,
                    directive.to_string(),
                ));
            }
            _ => match current.items.last_mut() {
                Some(BlifItem::Names { inputs, cover, .. }) => {
                    cover.push(read_cover_row(&line, inputs.len())?);
                }
                _ => {
                    return Err(BlifError::InvalidToken(
                        line.number,
                        "cover row outside of .names".to_string(),
                    ));
                }
            },
        }
    }

    if let Some(done) = model {
        netlist.models.push(done);
    }
    Ok(netlist)
}

/// Reads and parses a BLIF file.
pub fn read_netlist<P: AsRef<Path>>(path: P) -> Result<BlifNetlist> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    parse_netlist(&text)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_test() {
        let text = "\
# written by some mapper
.model netlist
.inputs ys__n0 ys__n1 \\
  ys__n2
.outputs ys__n5
.names ys__n0 ys__n1 new_n7
11 1
.names one
1
.gate NAND A=new_n7 B=ys__n2 Y=ys__n5   # comment
.latch ys__n5 ys__n6 re clk 1
.conn ys__n6 ys__n9
.end
.model other
.end
";
        let netlist = parse_netlist(text).unwrap();
        assert_eq!(netlist.models.len(), 2);
        assert!(matches!(
            netlist.model("nope"),
            Err(BlifError::MissingModel(_))
        ));

        let model = netlist.model("netlist").unwrap();
        assert_eq!(model.inputs, vec!["ys__n0", "ys__n1", "ys__n2"]);
        assert_eq!(
            model.items,
            vec![
                BlifItem::Names {
                    inputs: vec!["ys__n0".to_string(), "ys__n1".to_string()],
                    output: "new_n7".to_string(),
                    cover: vec![("11".to_string(), '1')],
                },
                BlifItem::Names {
                    inputs: vec![],
                    output: "one".to_string(),
                    cover: vec![(String::new(), '1')],
                },
                BlifItem::Gate {
                    kind: "NAND".to_string(),
                    pins: vec![
                        ("A".to_string(), "new_n7".to_string()),
                        ("B".to_string(), "ys__n2".to_string()),
                        ("Y".to_string(), "ys__n5".to_string()),
                    ],
                },
                BlifItem::Latch {
                    input: "ys__n5".to_string(),
                    output: "ys__n6".to_string(),
                    init: State::S1,
                },
                BlifItem::Conn {
                    lhs: "ys__n6".to_string(),
                    rhs: "ys__n9".to_string(),
                },
            ]
        );
        assert_eq!(
            model.nets(),
            vec![
                "ys__n0", "ys__n1", "ys__n2", "ys__n5", "new_n7", "one", "ys__n6", "ys__n9"
            ]
        );
    }

    #[test]
    fn errors_test() {
        assert!(matches!(
            parse_netlist(".inputs a\n"),
            Err(BlifError::InvalidToken(1, _))
        ));
        assert!(matches!(
            parse_netlist(".model m\n.names a y\n1 1\n10 1\n"),
            Err(BlifError::InvalidToken(4, _))
        ));
        assert!(matches!(
            parse_netlist(".model m\n.mlatch a b\n"),
            Err(BlifError::UnsupportedFeature(2, _))
        ));
        assert!(matches!(
            parse_netlist(".model m\n.latch a b 7\n"),
            Err(BlifError::InvalidToken(2, _))
        ));
        assert!(matches!(
            read_netlist("does/not/exist.blif"),
            Err(BlifError::IoError(_))
        ));
    }
}
