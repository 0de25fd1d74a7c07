use crate::prelude::*;
use clap::ArgMatches;
use dw_dex::classes::{ClassDef, ClassFlags};
use dw_dex::methods::MethodDef;
use dw_dex::types::Type;
use nu_ansi_term::Color;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;

pub fn run(args: &ArgMatches) -> DwResult<()> {
    init_logger(args);

    let resolver = match args.get_one::<String>("inline-table") {
        Some(filename) => {
            let table = fs::read_to_string(filename)?;
            InlineMethodResolver::from_table(&framework_classpath()?, &table)?
        }
        None => {
            let version = args
                .get_one::<u32>("vm-version")
                .ok_or_else(|| DwError::BadArguments("--vm-version needed".to_string()))?;
            InlineMethodResolver::for_vm_version(*version)?
        }
    };
    let filter = args
        .get_one::<String>("filter-method")
        .map(|re| Regex::new(re))
        .transpose()?;

    for (index, method) in resolver.iter() {
        match method {
            Some(method) => {
                let line = format!("{index:>3}: {method}");
                if filter.as_ref().map_or(true, |re| re.is_match(&line)) {
                    println!("{line}");
                }
            }
            None if filter.is_none() => {
                println!("{}", Color::Red.paint(format!("{index:>3}: <resolved by arguments count>")));
            }
            None => (),
        }
    }
    Ok(())
}

/// Class path of the framework classes declaring the builtin inline methods, against which
/// custom tables are resolved.
fn framework_classpath() -> DwResult<ClassPath> {
    let builtin = InlineMethodResolver::for_vm_version(36)?;
    let mut classes: BTreeMap<String, ClassDef> = BTreeMap::new();
    for (_, method) in builtin.iter() {
        let Some(InlineMethod { method, flags }) = method else {
            continue;
        };
        let class = classes.entry(method.definer.to_string()).or_insert_with(|| {
            ClassDef::new(method.definer.clone(), ClassFlags::ACC_PUBLIC)
                .with_superclass(Type::class("java/lang/Object"))
        });
        class.methods.push(MethodDef::new(
            &method.name,
            method.params.clone(),
            method.return_type.clone(),
            *flags,
        ));
    }
    Ok(ClassPath::new(classes.into_values(), ClassPathConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_classpath() {
        let classpath = framework_classpath().unwrap();
        let resolver = InlineMethodResolver::from_table(
            &classpath,
            "Ljava/lang/Math;->abs(I)I\nLjava/lang/String;->charAt(I)C\n",
        )
        .unwrap();
        assert!(resolver.resolve(0, 1).unwrap().is_static());
        assert_eq!(
            resolver.resolve(1, 2).unwrap().method.to_string(),
            "Ljava/lang/String;->charAt(I)C"
        );
        assert!(InlineMethodResolver::from_table(&classpath, "Ljava/lang/Math;->tan(D)D").is_err());
    }
}
