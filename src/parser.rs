mod loader;
mod nom_parser;

pub use self::{
    loader::{load, load_tree},
    nom_parser::{
        parse_file, AttrDef, BlackboardValue, PortDef, PortMap, TreeDef, TreeRootDef, TreeSource,
        VarDef,
    },
};
