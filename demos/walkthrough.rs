// SPDX-License-Identifier: MPL-2.0

use semver_solve::{resolve, FixedSdk, OracleBuilder, PackageDep, PackageId, PackageRef, Pubspec, SolveConfig, SolveError};

// `root` depends on `menu` and `icons`
// `menu` depends on `dropdown`
// `dropdown` depends on `icons`
// `icons` has no dependency
fn main() {
    let menu = PackageRef::named("menu");
    let icons = PackageRef::named("icons");
    let dropdown = PackageRef::named("dropdown");

    let oracle = OracleBuilder::new()
        .add(
            PackageId::new(menu.clone(), "1.0.0".parse().unwrap()),
            Pubspec::new(vec![PackageDep::any(dropdown.clone())]),
        )
        .add(
            PackageId::new(dropdown.clone(), "1.0.0".parse().unwrap()),
            Pubspec::new(vec![PackageDep::any(icons.clone())]),
        )
        .add(PackageId::new(icons.clone(), "1.0.0".parse().unwrap()), Pubspec::new(vec![]))
        .build();
    let sdk = FixedSdk::dart_only("3.0.0".parse().unwrap());

    let result = resolve(
        &oracle,
        &sdk,
        PackageRef::named("root"),
        "1.0.0".parse().unwrap(),
        vec![PackageDep::any(menu), PackageDep::any(icons)],
        SolveConfig::default(),
    );

    match result {
        Ok(solution) => println!("Solution: {:?}", solution.decisions),
        Err(SolveError::NoSolution(err)) => eprintln!("{}", err.explain()),
        Err(err) => panic!("{err}"),
    }
}
