use std::borrow::Cow;
use std::default::Default;
use std::io::{BufWriter, Error, ErrorKind, Write};

use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};

use crate::plan::{Plan, PlanNode};

impl<'a> TreeItem for &'a PlanNode {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(&self.operator))?;
        match self.cost {
            Some(cost) => write!(f, ", cost: {}", cost),
            None => Ok(()),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.inputs
                .iter()
                .map(|c| &**c)
                .collect::<Vec<&'a PlanNode>>(),
        )
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    write_tree_with(&&*plan.root, output, &config)
}

pub fn explain_to_string(plan: &Plan) -> std::io::Result<String> {
    let mut buf = BufWriter::new(Vec::new());

    explain(plan, &mut buf)?;

    let bytes = buf.into_inner()?;
    String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidData, e))
}
